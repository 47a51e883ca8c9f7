//! Catalog endpoint used to populate the order form.

use axum::{Json, extract::State};
use pexpress_core::Product;

use crate::error::Result;
use crate::state::AppState;

/// List every product with its rows, ordered by name.
///
/// GET /products
///
/// # Errors
///
/// Returns 500 if the catalog cannot be read.
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = state.sanity().list_products().await?;
    tracing::debug!(count = products.len(), "Catalog loaded");
    Ok(Json(products))
}
