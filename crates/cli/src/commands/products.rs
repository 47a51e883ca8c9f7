//! Catalog listing.
//!
//! # Usage
//!
//! ```bash
//! px-cli products
//! ```

use super::{CommandError, connect};

/// Log every product with its rows and stock, ordered by name.
///
/// # Returns
///
/// The number of products listed.
pub async fn list() -> Result<usize, CommandError> {
    let client = connect()?;
    let products = client.list_products().await?;

    for product in &products {
        tracing::info!("{} ({})", product.name, product.id);
        for row in &product.rows {
            tracing::info!("  {:<24} {:>6}  [{}]", row.flavor, row.stock, row.key);
        }
    }

    tracing::info!("{} product(s)", products.len());
    Ok(products.len())
}
