//! HTTP middleware stack for the stock service.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (added in `main`)
//! 2. `TraceLayer` (request span with method, uri and `request_id`)
//! 3. Request ID (reuse or generate `x-request-id`)
//! 4. CORS headers

pub mod cors;
pub mod request_id;

pub use cors::cors_middleware;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
