//! Named mutual-exclusion locks with bounded wait and leased hold.
//!
//! All contenders for one event serialize on the same [`LockKey`]. A holder keeps the
//! lock for at most its lease; after that the lock may be reclaimed by someone else,
//! so a crashed holder can never freeze an event forever.
//!
//! # Contract
//!
//! - `acquire` returns `Ok(None)` when `wait` elapses under contention. It only returns
//!   an error when the coordination backend itself fails.
//! - `release` is idempotent and safe on an expired handle: ownership is proven with
//!   the per-acquisition token, so a stale holder never frees a lock that now belongs
//!   to someone else.
//! - A holder whose critical section might outlive the lease must check
//!   [`LockHandle::lease_expired`] and [`LockManager::is_held`] before mutating shared
//!   state.
//!
//! # Implementations
//!
//! - `LocalLockManager` (in `boxoffice-runtime`): single process
//! - `RedisLockManager` (in `boxoffice-redis`): shared across processes

use crate::BoxFuture;
use crate::types::EventId;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Namespace prefix for per-event inventory locks.
pub const EVENT_LOCK_PREFIX: &str = "concert:";

/// Name of a lock.
///
/// # Examples
///
/// ```
/// use boxoffice_core::{EventId, LockKey};
///
/// let id = EventId::new();
/// let key = LockKey::for_event(id);
/// assert_eq!(key.as_str(), format!("concert:{id}"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LockKey(String);

impl LockKey {
    /// Create a key from a raw name.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key guarding an event's remaining-seat count.
    #[must_use]
    pub fn for_event(event_id: EventId) -> Self {
        Self(format!("{EVENT_LOCK_PREFIX}{event_id}"))
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof of a successful acquisition.
///
/// Holds the key, the ownership token and the instant the lease runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    key: LockKey,
    token: String,
    lease_deadline: Instant,
}

impl LockHandle {
    /// Record an acquisition that happened now with the given lease.
    #[must_use]
    pub fn new(key: LockKey, token: impl Into<String>, lease: Duration) -> Self {
        Self {
            key,
            token: token.into(),
            lease_deadline: Instant::now() + lease,
        }
    }

    /// The locked key.
    #[must_use]
    pub const fn key(&self) -> &LockKey {
        &self.key
    }

    /// Ownership token presented on release.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When the lease runs out.
    #[must_use]
    pub const fn lease_deadline(&self) -> Instant {
        self.lease_deadline
    }

    /// Whether the lease has run out (the lock may now belong to someone else).
    #[must_use]
    pub fn lease_expired(&self) -> bool {
        Instant::now() >= self.lease_deadline
    }
}

/// Errors from the coordination backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The backend could not be reached or answered with an error.
    #[error("Lock backend error: {0}")]
    Backend(String),

    /// A lease of zero would make the lock reclaimable immediately.
    #[error("Lock lease must be greater than zero")]
    ZeroLease,
}

/// Acquire and release named locks.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the manager can be shared as
/// `Arc<dyn LockManager>`.
pub trait LockManager: Send + Sync {
    /// Try to acquire `key`, waiting at most `wait`, holding it for at most `lease`.
    ///
    /// Returns `Ok(None)` if the lock could not be obtained within `wait`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] only for backend failures or a zero lease.
    fn acquire<'a>(
        &'a self,
        key: &'a LockKey,
        wait: Duration,
        lease: Duration,
    ) -> BoxFuture<'a, Result<Option<LockHandle>, LockError>>;

    /// Release a previously acquired lock. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Backend`] if the backend could not be reached.
    fn release<'a>(&'a self, handle: &'a LockHandle) -> BoxFuture<'a, Result<(), LockError>>;

    /// Whether `handle` still owns its key according to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Backend`] if the backend could not be reached.
    fn is_held<'a>(&'a self, handle: &'a LockHandle) -> BoxFuture<'a, Result<bool, LockError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_lease_expiry_tracks_time() {
        let start = Instant::now();
        let handle = LockHandle::new(LockKey::new("k"), "t", Duration::from_secs(10));
        assert!(!handle.lease_expired());
        assert_eq!(handle.lease_deadline(), start + Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!handle.lease_expired());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(handle.lease_expired());
    }

    #[test]
    fn test_event_keys_are_deterministic() {
        let id = EventId::new();
        assert_eq!(LockKey::for_event(id), LockKey::for_event(id));
        assert_ne!(LockKey::for_event(id), LockKey::for_event(EventId::new()));
        assert!(LockKey::for_event(id).as_str().starts_with(EVENT_LOCK_PREFIX));
    }
}
