//! `HashMap`-backed stores for development and tests.
//!
//! Records are cloned in and out, so callers never share mutable state with the store.

use boxoffice_core::{
    BoxFuture, EventId, EventInventory, InventoryStore, PrincipalId, Reservation,
    ReservationId, ReservationStore, StoreError,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory [`InventoryStore`].
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    events: RwLock<HashMap<EventId, EventInventory>>,
}

impl InMemoryInventoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Whether the store holds no events.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn get(&self, id: EventId) -> BoxFuture<'_, Result<Option<EventInventory>, StoreError>> {
        Box::pin(async move { Ok(self.events.read().await.get(&id).cloned()) })
    }

    fn save<'a>(&'a self, event: &'a EventInventory) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.events.write().await.insert(event.id, event.clone());
            Ok(())
        })
    }

    fn delete(&self, id: EventId) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async move { Ok(self.events.write().await.remove(&id).is_some()) })
    }

    fn list_all(&self) -> BoxFuture<'_, Result<Vec<EventInventory>, StoreError>> {
        Box::pin(async move {
            let mut events: Vec<_> = self.events.read().await.values().cloned().collect();
            events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
            Ok(events)
        })
    }

    fn find_by_owner<'a>(
        &'a self,
        owner: &'a PrincipalId,
    ) -> BoxFuture<'a, Result<Vec<EventInventory>, StoreError>> {
        Box::pin(async move {
            let mut events: Vec<_> = self
                .events
                .read()
                .await
                .values()
                .filter(|event| event.is_owned_by(owner))
                .cloned()
                .collect();
            events.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
            Ok(events)
        })
    }
}

/// In-memory [`ReservationStore`].
#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    reservations: RwLock<HashMap<ReservationId, Reservation>>,
}

impl InMemoryReservationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reservations.
    pub async fn len(&self) -> usize {
        self.reservations.read().await.len()
    }

    /// Whether the store holds no reservations.
    pub async fn is_empty(&self) -> bool {
        self.reservations.read().await.is_empty()
    }

    async fn matching<P>(&self, predicate: P) -> Vec<Reservation>
    where
        P: Fn(&Reservation) -> bool,
    {
        let mut found: Vec<_> = self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.reserved_at.cmp(&b.reserved_at));
        found
    }
}

impl ReservationStore for InMemoryReservationStore {
    fn get(&self, id: ReservationId) -> BoxFuture<'_, Result<Option<Reservation>, StoreError>> {
        Box::pin(async move { Ok(self.reservations.read().await.get(&id).cloned()) })
    }

    fn save<'a>(&'a self, reservation: &'a Reservation) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.reservations
                .write()
                .await
                .insert(reservation.id, reservation.clone());
            Ok(())
        })
    }

    fn find_by_requester<'a>(
        &'a self,
        requester: &'a PrincipalId,
    ) -> BoxFuture<'a, Result<Vec<Reservation>, StoreError>> {
        Box::pin(async move { Ok(self.matching(|r| r.is_owned_by(requester)).await) })
    }

    fn find_by_event(
        &self,
        event_id: EventId,
    ) -> BoxFuture<'_, Result<Vec<Reservation>, StoreError>> {
        Box::pin(async move { Ok(self.matching(|r| r.event_id == event_id).await) })
    }
}
