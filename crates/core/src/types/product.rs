//! Catalog model: products and their flavor rows.

use serde::{Deserialize, Serialize};

use super::{ProductId, Revision, RowKey, Stock};

/// A flavor/variant entry within a product, carrying its own stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Array key, unique within the owning product.
    pub key: RowKey,
    /// Display label (e.g. "Morango").
    pub flavor: String,
    /// Units available.
    pub stock: Stock,
}

/// A product document with its ordered rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Document ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Revision token of the snapshot this value was read from.
    #[serde(skip)]
    pub rev: Option<Revision>,
    /// Rows in their stored order.
    pub rows: Vec<Row>,
}

impl Product {
    /// Find a row by key.
    #[must_use]
    pub fn row(&self, key: &RowKey) -> Option<&Row> {
        self.rows.iter().find(|row| &row.key == key)
    }
}

/// A product read together with one of its rows, as seen at a single
/// revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSnapshot {
    /// Document ID.
    pub product_id: ProductId,
    /// Display name.
    pub product_name: String,
    /// Revision the snapshot was taken at.
    pub rev: Revision,
    /// The requested row, if the product has it.
    pub row: Option<Row>,
}
