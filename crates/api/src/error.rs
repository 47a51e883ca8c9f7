//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Failures are rendered as a
//! JSON body `{"error": "...", "currentStock": n}` where `currentStock` is
//! present only when a stock hint applies. Server-side failures are captured
//! to Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pexpress_core::Stock;
use serde::Serialize;
use thiserror::Error;

use crate::sanity::SanityError;
use crate::services::ReservationError;

/// Application-level error type for the stock service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Reservation failed.
    #[error(transparent)]
    Reservation(#[from] ReservationError),

    /// Sanity API operation failed outside a reservation.
    #[error("Sanity error: {0}")]
    Sanity(#[from] SanityError),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// The route exists but not for this method.
    #[error("Method not allowed")]
    MethodNotAllowed,
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stock: Option<Stock>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Reservation(err) => match err {
                ReservationError::InvalidInput(_) | ReservationError::InsufficientStock { .. } => {
                    StatusCode::BAD_REQUEST
                }
                ReservationError::NotFound { .. } => StatusCode::NOT_FOUND,
                ReservationError::Conflict { .. } => StatusCode::CONFLICT,
                ReservationError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Sanity(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Sanity(_) | Self::Reservation(ReservationError::Upstream(_))
        )
    }

    fn body(&self) -> ErrorResponse {
        // Don't expose internal error details to clients
        let error = if self.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let current_stock = match self {
            Self::Reservation(err) => err.current_stock(),
            _ => None,
        };
        ErrorResponse {
            error,
            current_stock,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
