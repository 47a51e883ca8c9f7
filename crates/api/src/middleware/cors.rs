//! CORS headers for the order form.
//!
//! The form is served from a different origin than this service, so every
//! response (errors included) carries the allow headers. Preflight requests
//! are answered by the routes themselves with `204 No Content`.

use axum::{
    extract::{Request, State},
    http::{
        HeaderValue,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
    },
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Methods the service answers.
pub const ALLOWED_METHODS: &str = "GET,POST,OPTIONS";

/// Request headers the browser may send.
pub const ALLOWED_HEADERS: &str = "Content-Type";

/// Add the CORS allow headers to every response.
pub async fn cors_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, state.allowed_origin().clone());
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );

    response
}
