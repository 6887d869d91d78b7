//! Leased locks for a single process.
//!
//! Each key maps to the token and lease deadline of its current holder. A waiter
//! sleeps until the holder releases, the holder's lease runs out, or its own wait
//! deadline passes, whichever comes first. Expired leases are purged from the table
//! on every acquire and count, whatever key they belong to.

use boxoffice_core::{BoxFuture, LockError, LockHandle, LockKey, LockManager};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug)]
struct Lease {
    token: String,
    expires_at: Instant,
}

/// In-process [`LockManager`].
///
/// Suitable for a single Inventory Authority instance and for tests. Running more
/// than one authority process requires a shared backend such as Redis.
#[derive(Debug, Default)]
pub struct LocalLockManager {
    leases: Mutex<HashMap<String, Lease>>,
    released: Notify,
}

impl LocalLockManager {
    /// Create a manager with no locks held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a live (unexpired) lease.
    pub async fn held_count(&self) -> usize {
        let mut leases = self.leases.lock().await;
        purge_expired(&mut leases, Instant::now());
        leases.len()
    }

    async fn acquire_inner(
        &self,
        key: &LockKey,
        wait: Duration,
        lease: Duration,
    ) -> Result<Option<LockHandle>, LockError> {
        if lease.is_zero() {
            return Err(LockError::ZeroLease);
        }

        let deadline = Instant::now() + wait;

        loop {
            // Register interest before inspecting the table so a release between the
            // check and the wait is not missed.
            let notified = self.released.notified();

            let holder_expires_at = {
                let mut leases = self.leases.lock().await;
                purge_expired(&mut leases, Instant::now());
                if let Some(current) = leases.get(key.as_str()) {
                    current.expires_at
                } else {
                    let handle = LockHandle::new(key.clone(), Uuid::new_v4().to_string(), lease);
                    leases.insert(
                        key.as_str().to_string(),
                        Lease {
                            token: handle.token().to_string(),
                            expires_at: handle.lease_deadline(),
                        },
                    );
                    tracing::debug!(lock_key = %key, lease_ms = lease.as_millis(), "Lock acquired");
                    return Ok(Some(handle));
                }
            };

            if Instant::now() >= deadline {
                tracing::debug!(lock_key = %key, wait_ms = wait.as_millis(), "Lock wait timed out");
                return Ok(None);
            }

            let wake_at = holder_expires_at.min(deadline);
            // Timing out here is expected: either the holder's lease ran out or our
            // own deadline passed. The loop re-checks both.
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn release_inner(&self, handle: &LockHandle) {
        let mut leases = self.leases.lock().await;
        let owned = leases
            .get(handle.key().as_str())
            .is_some_and(|lease| lease.token == handle.token());
        if owned {
            leases.remove(handle.key().as_str());
            drop(leases);
            self.released.notify_waiters();
            tracing::debug!(lock_key = %handle.key(), "Lock released");
        } else {
            tracing::debug!(
                lock_key = %handle.key(),
                "Release ignored: lock already released or reclaimed"
            );
        }
    }

    async fn is_held_inner(&self, handle: &LockHandle) -> bool {
        let now = Instant::now();
        self.leases
            .lock()
            .await
            .get(handle.key().as_str())
            .is_some_and(|lease| lease.token == handle.token() && lease.expires_at > now)
    }
}

fn purge_expired(leases: &mut HashMap<String, Lease>, now: Instant) {
    let before = leases.len();
    leases.retain(|_, lease| lease.expires_at > now);
    let purged = before - leases.len();
    if purged > 0 {
        tracing::debug!(purged, "Expired leases purged");
    }
}

impl LockManager for LocalLockManager {
    fn acquire<'a>(
        &'a self,
        key: &'a LockKey,
        wait: Duration,
        lease: Duration,
    ) -> BoxFuture<'a, Result<Option<LockHandle>, LockError>> {
        Box::pin(self.acquire_inner(key, wait, lease))
    }

    fn release<'a>(&'a self, handle: &'a LockHandle) -> BoxFuture<'a, Result<(), LockError>> {
        Box::pin(async move {
            self.release_inner(handle).await;
            Ok(())
        })
    }

    fn is_held<'a>(&'a self, handle: &'a LockHandle) -> BoxFuture<'a, Result<bool, LockError>> {
        Box::pin(async move { Ok(self.is_held_inner(handle).await) })
    }
}
