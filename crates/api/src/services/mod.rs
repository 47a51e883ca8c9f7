//! Business logic services.
//!
//! - [`reservation`] - optimistic-locking stock decrements (single row and batch)
//! - [`store`] - the document store seam the service runs against

pub mod reservation;
pub mod store;

#[cfg(test)]
pub(crate) mod memory;

pub use reservation::{
    LineReservation, MAX_ATTEMPTS, Reservation, ReservationError, StockReservationService,
};
pub use store::DocumentStore;
