//! Error taxonomy for both services.
//!
//! Validation and authorization errors are raised before any side effect.
//! Lock contention is deliberately *not* an [`InventoryError`] for reserve/rollback:
//! those operations answer `false` instead, and only administrative updates surface
//! [`InventoryError::LockTimeout`].

use crate::client::ClientError;
use crate::lock::{LockError, LockKey};
use crate::store::StoreError;
use crate::types::{
    EventId, InvalidQuantity, PrincipalId, ReservationId, ReservationStatus, SeatQuantity,
};
use thiserror::Error;

/// Rejected seat-count mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeatCountError {
    /// The caller holds a lock for a different key.
    #[error("Lock {actual} does not guard {expected}")]
    WrongLock {
        /// Key guarding the event being mutated
        expected: LockKey,
        /// Key of the handle presented
        actual: LockKey,
    },

    /// Taking the seats would make the count negative.
    #[error("Requested {requested} seats but only {available} remain")]
    Insufficient {
        /// Seats requested
        requested: u64,
        /// Seats remaining
        available: u64,
    },

    /// Returning the seats would exceed `u64::MAX`.
    #[error("Seat count overflow")]
    Overflow,
}

/// Errors raised by the Inventory Authority.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Non-positive quantity or malformed event draft.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown event id.
    #[error("Event not found: {0}")]
    NotFound(EventId),

    /// The caller does not own the event.
    #[error("{principal} is not allowed to modify event {event_id}")]
    Unauthorized {
        /// Event being modified
        event_id: EventId,
        /// Caller
        principal: PrincipalId,
    },

    /// The event lock could not be acquired in time (administrative operations only).
    #[error("Timed out waiting for lock {0}")]
    LockTimeout(LockKey),

    /// The coordination backend failed.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The inventory store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A seat-count mutation was rejected.
    #[error(transparent)]
    SeatCount(#[from] SeatCountError),
}

impl From<InvalidQuantity> for InventoryError {
    fn from(err: InvalidQuantity) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

/// Errors raised by the Reservation Orchestrator.
#[derive(Error, Debug)]
pub enum ReservationError {
    /// Non-positive quantity.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown reservation id.
    #[error("Reservation not found: {0}")]
    NotFound(ReservationId),

    /// The caller does not hold the reservation.
    #[error("{principal} is not allowed to modify reservation {reservation_id}")]
    Unauthorized {
        /// Reservation being modified
        reservation_id: ReservationId,
        /// Caller
        principal: PrincipalId,
    },

    /// The reservation is already cancelled.
    #[error("Reservation {0} is already cancelled")]
    AlreadyCancelled(ReservationId),

    /// The authority declined to take the seats.
    #[error("Not enough seats available for event {event_id} (requested {quantity})")]
    InsufficientInventory {
        /// Event requested
        event_id: EventId,
        /// Seats requested
        quantity: SeatQuantity,
    },

    /// The authority declined to give seats back during cancellation.
    #[error("Could not release seats for reservation {reservation_id}; it remains {status}")]
    CompensationFailed {
        /// Reservation whose cancellation failed
        reservation_id: ReservationId,
        /// Status the reservation kept
        status: ReservationStatus,
    },

    /// The reservation store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The remote inventory call failed.
    #[error(transparent)]
    Inventory(#[from] ClientError),

    /// The background worker running the saga failed.
    #[error("Reservation worker failed: {0}")]
    Worker(String),
}

impl From<InvalidQuantity> for ReservationError {
    fn from(err: InvalidQuantity) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl ReservationError {
    /// Whether this is a state conflict rather than a bad request or a crash.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyCancelled(_)
                | Self::InsufficientInventory { .. }
                | Self::CompensationFailed { .. }
        )
    }
}
