//! HTTP route handlers for the stock service.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health          - Liveness check
//! GET  /products        - Catalog with stock per row
//! POST /update-stock    - Reserve units from one row
//! POST /reservar-lote   - Reserve units from several rows at once
//! ```
//!
//! Every route answers `OPTIONS` with `204` and any other method with
//! `405 {"error": ...}`.

pub mod products;
pub mod stock;

use axum::{
    Router,
    routing::{MethodRouter, get, post},
};

use crate::state::AppState;

/// Create the API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", with_preflight(get(health)))
        .route("/products", with_preflight(get(products::list_products)))
        .route("/update-stock", with_preflight(post(stock::update_stock)))
        .route("/reservar-lote", with_preflight(post(stock::reserve_batch)))
}

/// Add the CORS preflight answer and the JSON 405 fallback to a route.
fn with_preflight(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route
        .options(stock::preflight)
        .fallback(stock::method_not_allowed)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check Sanity.
async fn health() -> &'static str {
    "ok"
}
