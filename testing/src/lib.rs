//! # Box Office Testing
//!
//! Testing utilities for the inventory and reservation services.
//!
//! This crate provides:
//! - A fixed [`Clock`] for deterministic timestamps
//! - [`ScriptedInventoryClient`]: a programmable remote inventory with a call log
//! - Store wrappers that fail or stall on demand
//! - Lock managers simulating contention and backend faults
//! - Fixtures and proptest strategies for domain types
//!
//! ## Example
//!
//! ```
//! use boxoffice_core::{EventId, InventoryClient, SeatQuantity};
//! use boxoffice_testing::{InventoryCall, ScriptedInventoryClient};
//!
//! # async fn example() {
//! let inventory = ScriptedInventoryClient::new();
//! inventory.answer_reserve(Ok(false));
//!
//! let event = EventId::new();
//! let quantity = SeatQuantity::new(2).unwrap();
//! assert_eq!(inventory.reserve_seats(event, quantity).await, Ok(false));
//! assert_eq!(inventory.calls(), vec![InventoryCall::Reserve(event, quantity)]);
//! # }
//! ```

use boxoffice_core::environment::Clock;
use chrono::{DateTime, Utc};

mod inventory_client;
mod locks;
mod stores;

pub use inventory_client::{InventoryCall, ScriptedInventoryClient};
pub use locks::{ContendedLockManager, FailingLockManager, ReclaimedLockManager};
pub use stores::{FlakyReservationStore, SlowInventoryStore};

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use boxoffice_testing::mocks::FixedClock;
    /// use boxoffice_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Domain fixtures.
pub mod fixtures {
    use boxoffice_core::{EventDraft, EventId, EventInventory, PrincipalId};
    use chrono::{DateTime, Utc};

    /// Owner used by fixtures unless a test says otherwise.
    pub const OWNER: &str = "owner@x.com";

    /// A requester used across reservation tests.
    pub const REQUESTER: &str = "a@x.com";

    /// A valid draft with `seats` seats.
    #[must_use]
    pub fn draft(seats: i64) -> EventDraft {
        EventDraft {
            title: "Spring Concert".to_string(),
            description: "Main hall".to_string(),
            starts_at: DateTime::<Utc>::UNIX_EPOCH,
            seat_count: seats,
        }
    }

    /// A published event owned by [`OWNER`] with `seats` remaining.
    #[must_use]
    pub fn event(seats: u64) -> EventInventory {
        EventInventory::restore(
            EventId::new(),
            "Spring Concert".to_string(),
            "Main hall".to_string(),
            DateTime::<Utc>::UNIX_EPOCH,
            PrincipalId::new(OWNER),
            seats,
        )
    }
}

/// Property-based testing strategies.
pub mod properties {
    use boxoffice_core::SeatQuantity;
    use proptest::prelude::*;

    /// One seat operation against a single event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SeatOp {
        /// Take seats
        Reserve(SeatQuantity),
        /// Give seats back
        Rollback(SeatQuantity),
    }

    /// Valid quantities in `1..=max`.
    pub fn seat_quantity(max: i64) -> impl Strategy<Value = SeatQuantity> {
        (1..=max.max(1)).prop_filter_map("positive quantity", |raw| SeatQuantity::new(raw).ok())
    }

    /// A sequence of reserve/rollback operations.
    pub fn seat_ops(max_quantity: i64, len: usize) -> impl Strategy<Value = Vec<SeatOp>> {
        proptest::collection::vec(
            prop_oneof![
                seat_quantity(max_quantity).prop_map(SeatOp::Reserve),
                seat_quantity(max_quantity).prop_map(SeatOp::Rollback),
            ],
            0..=len,
        )
    }
}

/// Install a `tracing` subscriber writing to the test harness's captured output.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub use mocks::{FixedClock, test_clock};
