use boxoffice_core::{BoxFuture, LockError, LockHandle, LockKey, LockManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A [`LockManager`] whose lock is always held by someone else.
///
/// `acquire` waits out the full timeout and returns `None`.
#[derive(Debug, Default)]
pub struct ContendedLockManager {
    attempts: AtomicUsize,
}

impl ContendedLockManager {
    /// Create a manager that never grants a lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `acquire` calls so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl LockManager for ContendedLockManager {
    fn acquire<'a>(
        &'a self,
        _key: &'a LockKey,
        wait: Duration,
        _lease: Duration,
    ) -> BoxFuture<'a, Result<Option<LockHandle>, LockError>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(wait).await;
            Ok(None)
        })
    }

    fn release<'a>(&'a self, _handle: &'a LockHandle) -> BoxFuture<'a, Result<(), LockError>> {
        Box::pin(async { Ok(()) })
    }

    fn is_held<'a>(&'a self, _handle: &'a LockHandle) -> BoxFuture<'a, Result<bool, LockError>> {
        Box::pin(async { Ok(false) })
    }
}

/// A [`LockManager`] that grants every lock and then loses it.
///
/// `acquire` succeeds at once, but `is_held` always answers `false`, as when a
/// shared backend has already handed the key to another process.
#[derive(Debug, Default)]
pub struct ReclaimedLockManager {
    ownership_checks: AtomicUsize,
}

impl ReclaimedLockManager {
    /// Create a manager whose holders never keep their lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `is_held` calls so far.
    #[must_use]
    pub fn ownership_checks(&self) -> usize {
        self.ownership_checks.load(Ordering::SeqCst)
    }
}

impl LockManager for ReclaimedLockManager {
    fn acquire<'a>(
        &'a self,
        key: &'a LockKey,
        _wait: Duration,
        lease: Duration,
    ) -> BoxFuture<'a, Result<Option<LockHandle>, LockError>> {
        Box::pin(async move { Ok(Some(LockHandle::new(key.clone(), "reclaimed", lease))) })
    }

    fn release<'a>(&'a self, _handle: &'a LockHandle) -> BoxFuture<'a, Result<(), LockError>> {
        Box::pin(async { Ok(()) })
    }

    fn is_held<'a>(&'a self, _handle: &'a LockHandle) -> BoxFuture<'a, Result<bool, LockError>> {
        Box::pin(async move {
            self.ownership_checks.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        })
    }
}

/// A [`LockManager`] whose backend is unreachable.
#[derive(Debug, Clone)]
pub struct FailingLockManager {
    message: String,
}

impl Default for FailingLockManager {
    fn default() -> Self {
        Self::new("connection refused")
    }
}

impl FailingLockManager {
    /// Fail every call with `LockError::Backend(message)`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn error(&self) -> LockError {
        LockError::Backend(self.message.clone())
    }
}

impl LockManager for FailingLockManager {
    fn acquire<'a>(
        &'a self,
        _key: &'a LockKey,
        _wait: Duration,
        _lease: Duration,
    ) -> BoxFuture<'a, Result<Option<LockHandle>, LockError>> {
        Box::pin(async move { Err(self.error()) })
    }

    fn release<'a>(&'a self, _handle: &'a LockHandle) -> BoxFuture<'a, Result<(), LockError>> {
        Box::pin(async move { Err(self.error()) })
    }

    fn is_held<'a>(&'a self, _handle: &'a LockHandle) -> BoxFuture<'a, Result<bool, LockError>> {
        Box::pin(async move { Err(self.error()) })
    }
}
