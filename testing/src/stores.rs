use boxoffice_core::{
    BoxFuture, EventId, EventInventory, InventoryStore, PrincipalId, Reservation,
    ReservationId, ReservationStore, StoreError,
};
use boxoffice_runtime::{InMemoryInventoryStore, InMemoryReservationStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory [`ReservationStore`] whose saves can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyReservationStore {
    inner: InMemoryReservationStore,
    fail_all: AtomicBool,
    fail_next: AtomicUsize,
    save_attempts: AtomicUsize,
}

impl FlakyReservationStore {
    /// A store that works until told otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every save fail (or stop doing so).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` saves fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of `save` calls, failed or not.
    #[must_use]
    pub fn save_attempts(&self) -> usize {
        self.save_attempts.load(Ordering::SeqCst)
    }

    /// Number of records actually stored.
    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    /// Whether nothing was stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.is_empty().await
    }

    fn should_fail(&self) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ReservationStore for FlakyReservationStore {
    fn get(&self, id: ReservationId) -> BoxFuture<'_, Result<Option<Reservation>, StoreError>> {
        self.inner.get(id)
    }

    fn save<'a>(&'a self, reservation: &'a Reservation) -> BoxFuture<'a, Result<(), StoreError>> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail() {
            return Box::pin(async {
                Err(StoreError::Database("injected save failure".to_string()))
            });
        }
        self.inner.save(reservation)
    }

    fn find_by_requester<'a>(
        &'a self,
        requester: &'a PrincipalId,
    ) -> BoxFuture<'a, Result<Vec<Reservation>, StoreError>> {
        self.inner.find_by_requester(requester)
    }

    fn find_by_event(
        &self,
        event_id: EventId,
    ) -> BoxFuture<'_, Result<Vec<Reservation>, StoreError>> {
        self.inner.find_by_event(event_id)
    }
}

/// In-memory [`InventoryStore`] that stalls before answering reads.
///
/// Used to push a critical section past its lock lease.
#[derive(Debug)]
pub struct SlowInventoryStore {
    inner: InMemoryInventoryStore,
    read_delay: Duration,
    fail_saves: AtomicBool,
}

impl SlowInventoryStore {
    /// Delay every `get` by `read_delay` (honours paused tokio time).
    #[must_use]
    pub fn new(read_delay: Duration) -> Self {
        Self {
            inner: InMemoryInventoryStore::new(),
            read_delay,
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make saves fail (or stop doing so).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Seed a record without delay.
    ///
    /// # Errors
    ///
    /// Never fails for the in-memory backend.
    pub async fn seed(&self, event: &EventInventory) -> Result<(), StoreError> {
        self.inner.save(event).await
    }
}

impl InventoryStore for SlowInventoryStore {
    fn get(&self, id: EventId) -> BoxFuture<'_, Result<Option<EventInventory>, StoreError>> {
        Box::pin(async move {
            tokio::time::sleep(self.read_delay).await;
            self.inner.get(id).await
        })
    }

    fn save<'a>(&'a self, event: &'a EventInventory) -> BoxFuture<'a, Result<(), StoreError>> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Box::pin(async {
                Err(StoreError::Database("injected save failure".to_string()))
            });
        }
        self.inner.save(event)
    }

    fn delete(&self, id: EventId) -> BoxFuture<'_, Result<bool, StoreError>> {
        self.inner.delete(id)
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<EventInventory>, StoreError>> {
        self.inner.list_all()
    }

    fn find_by_owner<'a>(
        &'a self,
        owner: &'a PrincipalId,
    ) -> BoxFuture<'a, Result<Vec<EventInventory>, StoreError>> {
        self.inner.find_by_owner(owner)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::fixtures;
    use boxoffice_core::{ReservationWorkflow, SeatQuantity};
    use chrono::Utc;

    fn reservation() -> Reservation {
        Reservation::open(
            EventId::new(),
            PrincipalId::new(fixtures::REQUESTER),
            SeatQuantity::new(1).unwrap(),
            ReservationWorkflow::ConfirmImmediately,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_fail_next_saves_counts_down() {
        let store = FlakyReservationStore::new();
        store.fail_next_saves(1);

        assert!(store.save(&reservation()).await.is_err());
        assert!(store.save(&reservation()).await.is_ok());
        assert_eq!(store.save_attempts(), 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_fail_all_saves() {
        let store = FlakyReservationStore::new();
        store.fail_saves(true);
        assert!(store.save(&reservation()).await.is_err());
        assert!(store.save(&reservation()).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_delays_reads() {
        let store = SlowInventoryStore::new(Duration::from_secs(3));
        let event = fixtures::event(5);
        store.seed(&event).await.unwrap();

        let started = tokio::time::Instant::now();
        assert_eq!(store.get(event.id).await.unwrap(), Some(event));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }
}
