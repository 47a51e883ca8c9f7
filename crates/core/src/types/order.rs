//! Order lines submitted for batch reservation.

use serde::{Deserialize, Serialize};

use super::{ProductId, Quantity, QuantityError, RowKey};

/// One requested `(product, row, quantity)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub row_key: RowKey,
    #[serde(rename = "qty")]
    pub quantity: Quantity,
}

/// Merge lines that target the same row by summing their quantities.
///
/// The first occurrence of each `(product, row)` pair keeps its position, so
/// the output order follows the order in which rows were first requested.
///
/// # Errors
///
/// Returns [`QuantityError::TooLarge`] if a merged quantity overflows.
pub fn coalesce_lines(
    lines: impl IntoIterator<Item = OrderLine>,
) -> Result<Vec<OrderLine>, QuantityError> {
    let mut merged: Vec<OrderLine> = Vec::new();
    for line in lines {
        if let Some(existing) = merged
            .iter_mut()
            .find(|m| m.product_id == line.product_id && m.row_key == line.row_key)
        {
            existing.quantity = existing.quantity.checked_add(line.quantity)?;
        } else {
            merged.push(line);
        }
    }
    Ok(merged)
}
