//! # Box Office Runtime
//!
//! In-process building blocks shared by both services:
//!
//! - **[`LocalLockManager`]**: leased, bounded-wait locks for a single process
//! - **[`memory`]**: `HashMap`-backed inventory and reservation stores
//! - **[`retry`]**: exponential backoff used by saga compensation
//! - **[`WorkerPool`]**: bounded pool running reservation sagas off the caller's task
//! - **[`metrics`]**: Prometheus recorder and the metric names used across the workspace
//!
//! ## Example
//!
//! ```
//! use boxoffice_core::{EventId, LockKey, LockManager};
//! use boxoffice_runtime::LocalLockManager;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), boxoffice_core::LockError> {
//! let locks = LocalLockManager::new();
//! let key = LockKey::for_event(EventId::new());
//!
//! if let Some(handle) = locks
//!     .acquire(&key, Duration::from_secs(5), Duration::from_secs(10))
//!     .await?
//! {
//!     // critical section
//!     locks.release(&handle).await?;
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

/// In-process leased locks
pub mod local_lock;

/// In-memory stores
pub mod memory;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

/// Bounded worker pool for background sagas
pub mod worker;

pub use local_lock::LocalLockManager;
pub use memory::{InMemoryInventoryStore, InMemoryReservationStore};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use worker::{TaskHandle, WorkerError, WorkerPool};
