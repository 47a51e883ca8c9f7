//! Pexpress CLI - catalog inspection and manual stock reservations.
//!
//! # Usage
//!
//! ```bash
//! # List products with stock per flavor
//! px-cli products
//!
//! # Take 2 units out of one flavor row
//! px-cli reserve --product pote-500 --row a1b2c3 --quantity 2
//! ```
//!
//! # Commands
//!
//! - `products` - List the catalog ordered by name
//! - `reserve` - Reserve stock with the same retry rules as the service
//!
//! Reads the same `SANITY_*` variables as the service.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use pexpress_core::Quantity;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "px-cli")]
#[command(author, version, about = "Pexpress CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products and stock per flavor
    Products,
    /// Reserve stock from one flavor row
    Reserve {
        /// Product document ID
        #[arg(short, long)]
        product: String,

        /// Row key within the product
        #[arg(short, long)]
        row: String,

        /// Units to take (positive integer)
        #[arg(short, long)]
        quantity: Quantity,
    },
}

/// Used when `RUST_LOG` is unset. Commands report their results at INFO.
const DEFAULT_LOG_FILTER: &str = "px_cli=info,pexpress_api=info";

fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Products => {
            commands::products::list().await?;
        }
        Commands::Reserve {
            product,
            row,
            quantity,
        } => {
            commands::reserve::run(&product, &row, quantity).await?;
        }
    }
    Ok(())
}
