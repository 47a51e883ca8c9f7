//! Manual stock reservation.
//!
//! Runs the same revision-guarded reservation as `POST /update-stock`, for
//! corrections made outside the order form.
//!
//! # Usage
//!
//! ```bash
//! px-cli reserve --product pote-500 --row a1b2c3 --quantity 2
//! ```

use pexpress_api::services::StockReservationService;
use pexpress_core::{ProductId, Quantity, RowKey, Stock};

use super::{CommandError, connect};

/// Take `quantity` units out of one row.
///
/// # Returns
///
/// The stock left in the row.
pub async fn run(product: &str, row: &str, quantity: Quantity) -> Result<Stock, CommandError> {
    let service = StockReservationService::new(connect()?);
    let product_id = ProductId::new(product);
    let row_key = RowKey::new(row);

    tracing::info!("Reserving {} unit(s) of {}/{}", quantity, product_id, row_key);
    let reservation = service.reserve(&product_id, &row_key, quantity).await?;

    tracing::info!("Reserved. New stock: {}", reservation.new_stock);
    Ok(reservation.new_stock)
}
