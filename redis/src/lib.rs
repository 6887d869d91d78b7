//! Redis-backed [`LockManager`] shared by every Inventory Authority process.
//!
//! # Algorithm
//!
//! 1. `SET key token NX PX lease`: succeeds only when nobody holds the key
//! 2. On contention, poll again with capped backoff until the wait deadline
//! 3. Release with a compare-and-delete script so only the token holder can free it
//!
//! Redis expires the key after the lease, so a crashed holder frees the event on its own.

#![forbid(unsafe_code)]

use boxoffice_core::{BoxFuture, LockError, LockHandle, LockKey, LockManager};
use rand::Rng;
use redis::Client;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Deletes `KEYS[1]` only if it still holds the caller's token.
const RELEASE_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
";

const INITIAL_POLL: Duration = Duration::from_millis(5);
const MAX_POLL: Duration = Duration::from_millis(100);

/// Spread pollers out so waiters on one key do not retry in lockstep.
fn jittered(poll: Duration) -> Duration {
    poll.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
}

/// `Redis`-based lock manager.
///
/// # Example
///
/// ```no_run
/// use boxoffice_core::{EventId, LockKey, LockManager};
/// use boxoffice_redis::RedisLockManager;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let locks = RedisLockManager::new("redis://127.0.0.1:6379").await?;
/// let key = LockKey::for_event(EventId::new());
/// if let Some(handle) = locks.acquire(&key, Duration::from_secs(5), Duration::from_secs(10)).await? {
///     locks.release(&handle).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisLockManager {
    conn_manager: ConnectionManager,
    release_script: redis::Script,
}

impl RedisLockManager {
    /// Connect to `Redis`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Backend`] if the connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self, LockError> {
        let client = Client::open(redis_url)
            .map_err(|e| LockError::Backend(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            LockError::Backend(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self::from_connection(conn_manager))
    }

    /// Use an existing connection manager.
    #[must_use]
    pub fn from_connection(conn_manager: ConnectionManager) -> Self {
        Self {
            conn_manager,
            release_script: redis::Script::new(RELEASE_SCRIPT),
        }
    }

    #[allow(clippy::cast_possible_truncation)] // Clamped to u64::MAX first
    fn lease_millis(lease: Duration) -> u64 {
        lease.as_millis().min(u128::from(u64::MAX)).max(1) as u64
    }

    async fn try_set(&self, key: &LockKey, token: &str, lease_ms: u64) -> Result<bool, LockError> {
        let mut conn = self.conn_manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key.as_str())
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(lease_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(format!("Failed to acquire {key}: {e}")))?;
        Ok(reply.is_some())
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
        let token = Uuid::new_v4().to_string();
        let lease_ms = Self::lease_millis(lease);
        let mut poll = INITIAL_POLL;

        loop {
            let sent_at = Instant::now();
            if self.try_set(key, &token, lease_ms).await? {
                // The key may have started expiring before the reply arrived.
                let remaining = lease.saturating_sub(sent_at.elapsed());
                tracing::debug!(lock_key = %key, lease_ms, "Lock acquired");
                return Ok(Some(LockHandle::new(key.clone(), token, remaining)));
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(lock_key = %key, wait_ms = wait.as_millis(), "Lock wait timed out");
                return Ok(None);
            }

            tokio::time::sleep(jittered(poll).min(deadline - now)).await;
            poll = (poll * 2).min(MAX_POLL);
        }
    }

    async fn release_inner(&self, handle: &LockHandle) -> Result<(), LockError> {
        let mut conn = self.conn_manager.clone();
        let deleted: i64 = self
            .release_script
            .key(handle.key().as_str())
            .arg(handle.token())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(format!("Failed to release {}: {e}", handle.key())))?;

        if deleted == 0 {
            tracing::debug!(
                lock_key = %handle.key(),
                "Release ignored: lock already released or reclaimed"
            );
        } else {
            tracing::debug!(lock_key = %handle.key(), "Lock released");
        }
        Ok(())
    }

    async fn is_held_inner(&self, handle: &LockHandle) -> Result<bool, LockError> {
        let mut conn = self.conn_manager.clone();
        let current: Option<String> = redis::cmd("GET")
            .arg(handle.key().as_str())
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(format!("Failed to read {}: {e}", handle.key())))?;
        Ok(current.as_deref() == Some(handle.token()))
    }
}

impl LockManager for RedisLockManager {
    fn acquire<'a>(
        &'a self,
        key: &'a LockKey,
        wait: Duration,
        lease: Duration,
    ) -> BoxFuture<'a, Result<Option<LockHandle>, LockError>> {
        Box::pin(self.acquire_inner(key, wait, lease))
    }

    fn release<'a>(&'a self, handle: &'a LockHandle) -> BoxFuture<'a, Result<(), LockError>> {
        Box::pin(self.release_inner(handle))
    }

    fn is_held<'a>(&'a self, handle: &'a LockHandle) -> BoxFuture<'a, Result<bool, LockError>> {
        Box::pin(self.is_held_inner(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_millis_is_never_zero() {
        assert_eq!(RedisLockManager::lease_millis(Duration::from_micros(10)), 1);
        assert_eq!(RedisLockManager::lease_millis(Duration::from_secs(10)), 10_000);
        assert_eq!(RedisLockManager::lease_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_jitter_stays_within_half_to_full_interval() {
        for _ in 0..100 {
            let delay = jittered(MAX_POLL);
            assert!(delay >= MAX_POLL / 2 && delay <= MAX_POLL);
        }
    }
}
