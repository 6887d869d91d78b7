//! The Reservation Orchestrator's view of the Inventory Authority.
//!
//! The orchestrator only ever talks to inventory through this trait, so its saga
//! logic stays transport-agnostic. `HttpInventoryClient` (in `boxoffice-reservation`)
//! is the network implementation; the authority itself implements the trait for
//! in-process wiring, and `ScriptedInventoryClient` (in `boxoffice-testing`) fakes it.

use crate::BoxFuture;
use crate::types::{EventId, EventInventory, SeatQuantity};
use thiserror::Error;

/// Errors from a remote inventory call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The event does not exist on the authority.
    #[error("Event not found: {0}")]
    NotFound(EventId),

    /// The authority rejected the request arguments.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The request could not be delivered or timed out.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The authority answered with an unexpected status.
    #[error("Inventory service returned {status}: {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode inventory response: {0}")]
    Decode(String),
}

/// Remote inventory operations.
///
/// `reserve_seats` and `rollback_reserve_seats` answer `false` both for insufficient
/// supply and for lock contention on the authority; the two are not distinguished.
pub trait InventoryClient: Send + Sync {
    /// Fetch an event (possibly stale by the time it is read).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] for an unknown event.
    fn get_inventory(&self, event_id: EventId) -> BoxFuture<'_, Result<EventInventory, ClientError>>;

    /// Whether at least `quantity` seats remain.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] when `quantity <= 0`.
    fn check_availability(
        &self,
        event_id: EventId,
        quantity: i64,
    ) -> BoxFuture<'_, Result<bool, ClientError>>;

    /// Atomically take seats. `false` means nothing was taken.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the call failed; the remote effect is then unknown.
    fn reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> BoxFuture<'_, Result<bool, ClientError>>;

    /// Atomically give seats back. `false` means nothing was returned.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the call failed; the remote effect is then unknown.
    fn rollback_reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> BoxFuture<'_, Result<bool, ClientError>>;
}
