//! Core types for Pexpress.
//!
//! This module provides type-safe wrappers for the catalog and reservation
//! domain.

pub mod id;
pub mod order;
pub mod product;
pub mod quantity;
pub mod stock;

pub use id::*;
pub use order::{OrderLine, coalesce_lines};
pub use product::{Product, Row, RowSnapshot};
pub use quantity::{Quantity, QuantityError};
pub use stock::Stock;
