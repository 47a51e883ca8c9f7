//! Conversions from Sanity wire shapes to `pexpress_core` types.

use pexpress_core::{Product, ProductId, Revision, Row, RowKey, RowSnapshot, Stock};

use super::types::{SanityProduct, SanityRow, SanityRowSnapshot};

impl From<SanityRow> for Row {
    fn from(row: SanityRow) -> Self {
        Self {
            stock: Stock::from_stored(row.stock.as_ref()),
            key: RowKey::from(row.key),
            flavor: row.flavor.unwrap_or_default(),
        }
    }
}

impl From<SanityRowSnapshot> for RowSnapshot {
    fn from(snapshot: SanityRowSnapshot) -> Self {
        Self {
            product_id: ProductId::from(snapshot.id),
            product_name: snapshot.name.unwrap_or_default(),
            rev: Revision::from(snapshot.rev),
            row: snapshot.row.map(Row::from),
        }
    }
}

impl From<SanityProduct> for Product {
    fn from(product: SanityProduct) -> Self {
        Self {
            id: ProductId::from(product.id),
            name: product.name.unwrap_or_default(),
            rev: product.rev.map(Revision::from),
            rows: product
                .rows
                .unwrap_or_default()
                .into_iter()
                .map(Row::from)
                .collect(),
        }
    }
}
