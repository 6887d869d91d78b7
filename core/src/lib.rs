//! # Box Office Core
//!
//! Domain types and ports for the seat inventory protocol.
//!
//! Two services cooperate over these types:
//!
//! - The **Inventory Authority** owns each event's remaining-seat count and mutates it
//!   only while holding the event's lock (see [`lock::LockManager`]).
//! - The **Reservation Orchestrator** reserves seats remotely through an
//!   [`client::InventoryClient`], records reservations in a [`store::ReservationStore`],
//!   and compensates with a rollback when a later step fails.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐   reserve / rollback   ┌─────────────────────────┐
//! │ Reservation Orchestrator │ ─────────────────────▶ │   Inventory Authority   │
//! │   (saga + compensation)  │      InventoryClient   │  (lock → mutate → save) │
//! └────────────┬─────────────┘                        └────────────┬────────────┘
//!              │                                                   │
//!              ▼                                                   ▼
//!     ReservationStore                               LockManager + InventoryStore
//! ```
//!
//! This crate holds no I/O. Implementations live in `boxoffice-runtime` (in-process),
//! `boxoffice-redis`, `boxoffice-postgres` and `boxoffice-testing`.

pub mod client;
pub mod error;
pub mod lock;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use client::{ClientError, InventoryClient};
pub use error::{InventoryError, ReservationError, SeatCountError};
pub use lock::{LockError, LockHandle, LockKey, LockManager};
pub use store::{InventoryStore, ReservationStore, StoreError};
pub use types::{
    EventDraft, EventId, EventInventory, InvalidQuantity, PrincipalId, Reservation,
    ReservationId, ReservationStatus, ReservationWorkflow, SeatQuantity,
};

/// Boxed, `Send` future returned by the dyn-compatible ports in this crate.
///
/// The ports return explicit boxed futures instead of `async fn` so they can be used
/// as trait objects (`Arc<dyn InventoryStore>`).
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Environment module - injected dependencies that are not storage or transport.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use boxoffice_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock backed by [`Utc::now`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
