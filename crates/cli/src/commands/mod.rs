//! Subcommand implementations.

pub mod products;
pub mod reserve;

use pexpress_api::config::{ConfigError, SanityConfig};
use pexpress_api::sanity::{SanityClient, SanityError};
use pexpress_api::services::ReservationError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sanity request failed.
    #[error("Sanity error: {0}")]
    Sanity(#[from] SanityError),

    /// Reservation was refused.
    #[error("Reservation failed: {0}")]
    Reservation(#[from] ReservationError),
}

/// Build a Sanity client from the environment (and `.env`, if present).
fn connect() -> Result<SanityClient, CommandError> {
    let config = SanityConfig::from_env()?;
    tracing::info!(
        project_id = %config.project_id,
        dataset = %config.dataset,
        "Connecting to Sanity"
    );
    Ok(SanityClient::new(&config)?)
}
