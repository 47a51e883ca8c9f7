//! Application state shared across handlers.

use std::sync::Arc;

use axum::http::HeaderValue;

use crate::config::ApiConfig;
use crate::sanity::{SanityClient, SanityError};
use crate::services::StockReservationService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Holds no mutable state: concurrent
/// reservations are arbitrated by the store's revision checks alone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    sanity: SanityClient,
    reservations: StockReservationService<SanityClient>,
    allowed_origin: HeaderValue,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the Sanity client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, SanityError> {
        let sanity = SanityClient::new(&config.sanity)?;
        let reservations = StockReservationService::new(sanity.clone());
        let allowed_origin = HeaderValue::from_str(&config.cors_allowed_origin)
            .unwrap_or_else(|_| HeaderValue::from_static("*"));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                sanity,
                reservations,
                allowed_origin,
            }),
        })
    }

    /// Get a reference to the Sanity client.
    #[must_use]
    pub fn sanity(&self) -> &SanityClient {
        &self.inner.sanity
    }

    /// Get a reference to the reservation service.
    #[must_use]
    pub fn reservations(&self) -> &StockReservationService<SanityClient> {
        &self.inner.reservations
    }

    /// `Access-Control-Allow-Origin` value sent on every response.
    #[must_use]
    pub fn allowed_origin(&self) -> &HeaderValue {
        &self.inner.allowed_origin
    }
}
