//! Record storage ports.
//!
//! Both stores are plain get/save/find collaborators. Neither provides locking:
//! the Inventory Authority serializes event mutations through the lock manager, and
//! reservations are private per id.
//!
//! # Implementations
//!
//! - `InMemoryInventoryStore` / `InMemoryReservationStore` (in `boxoffice-runtime`)
//! - `PostgresInventoryStore` / `PostgresReservationStore` (in `boxoffice-postgres`)

use crate::BoxFuture;
use crate::types::{EventId, EventInventory, PrincipalId, Reservation, ReservationId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be decoded into a domain record.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Storage for event inventory records.
pub trait InventoryStore: Send + Sync {
    /// Load one event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn get(&self, id: EventId) -> BoxFuture<'_, Result<Option<EventInventory>, StoreError>>;

    /// Insert or replace an event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn save<'a>(&'a self, event: &'a EventInventory) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Delete an event. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn delete(&self, id: EventId) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// All events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn list_all(&self) -> BoxFuture<'_, Result<Vec<EventInventory>, StoreError>>;

    /// Events published by `owner`, latest `starts_at` first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn find_by_owner<'a>(
        &'a self,
        owner: &'a PrincipalId,
    ) -> BoxFuture<'a, Result<Vec<EventInventory>, StoreError>>;
}

/// Storage for reservation records.
pub trait ReservationStore: Send + Sync {
    /// Load one reservation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn get(&self, id: ReservationId) -> BoxFuture<'_, Result<Option<Reservation>, StoreError>>;

    /// Insert or replace a reservation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn save<'a>(&'a self, reservation: &'a Reservation) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Reservations held by `requester`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn find_by_requester<'a>(
        &'a self,
        requester: &'a PrincipalId,
    ) -> BoxFuture<'a, Result<Vec<Reservation>, StoreError>>;

    /// Reservations against `event_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn find_by_event(&self, event_id: EventId) -> BoxFuture<'_, Result<Vec<Reservation>, StoreError>>;
}
