//! Sanity Content Lake client.
//!
//! # Architecture
//!
//! - Plain HTTP/JSON against the query and mutate endpoints (no SDK)
//! - GROQ queries live in [`queries`], mutation bodies in [`mutations`]
//! - Wire shapes are converted into `pexpress_core` types in [`conversions`]
//! - Every write the service makes is a `dec` patch guarded by `ifRevisionID`
//!
//! # Example
//!
//! ```rust,ignore
//! use pexpress_api::sanity::SanityClient;
//!
//! let client = SanityClient::new(&config.sanity)?;
//!
//! let snapshot = client.fetch_row(&product_id, &row_key).await?;
//! let patch = StockPatch::new(product_id, snapshot.rev).decrement(row_key, quantity);
//! client.commit(&[patch]).await?;
//! ```

mod client;
pub mod conversions;
pub mod mutations;
pub mod queries;
pub mod types;

pub use client::{MutationReceipt, SanityClient};
pub use mutations::StockPatch;

use thiserror::Error;

/// Errors that can occur when talking to the Sanity API.
#[derive(Debug, Error)]
pub enum SanityError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A conditional write was rejected because the document changed.
    #[error("Revision mismatch ({status}): {message}")]
    RevisionMismatch { status: u16, message: String },

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl SanityError {
    /// Whether this is the store's optimistic-lock rejection (HTTP 409/412).
    #[must_use]
    pub const fn is_revision_conflict(&self) -> bool {
        matches!(self, Self::RevisionMismatch { .. })
    }

    /// Classify a non-success response from the mutate/query endpoints.
    #[must_use]
    pub fn from_status(status: u16, message: String) -> Self {
        if status == 409 || status == 412 {
            Self::RevisionMismatch { status, message }
        } else {
            Self::Api { status, message }
        }
    }
}
