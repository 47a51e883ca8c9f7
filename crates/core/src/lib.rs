//! Pexpress Core - Shared types library.
//!
//! This crate provides common types used across all Pexpress components:
//! - `api` - Stock reservation HTTP service
//! - `cli` - Command-line tools for inspecting and reserving stock
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for document IDs, quantities, stock counts,
//!   and the product/row catalog model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
