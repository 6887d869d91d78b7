//! The Inventory Authority.
//!
//! Owns every event's remaining-seat count. Each mutation runs as
//! acquire event lock → read → mutate → persist → release, and the release happens on
//! every exit path once the lock was obtained.
//!
//! Seat operations never surface lock contention as an error: [`SeatOutcome`] reports
//! it, and the `bool` operations collapse it together with insufficient supply.

use boxoffice_core::{
    BoxFuture, ClientError, EventDraft, EventId, EventInventory, InventoryClient,
    InventoryError, InventoryStore, LockHandle, LockKey, LockManager, PrincipalId,
    SeatQuantity,
};
use boxoffice_runtime::metrics::InventoryMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Result of a seat operation that reached the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatOutcome {
    /// The count changed and was persisted.
    Applied,
    /// Fewer seats remain than were requested; nothing changed.
    InsufficientSeats {
        /// Seats remaining at the time of the check
        available: u64,
    },
    /// The event lock was not obtained in time, or its lease ran out before the
    /// write; nothing changed.
    LockContended,
}

impl SeatOutcome {
    /// Whether the operation took effect.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::InsufficientSeats { .. } => "insufficient",
            Self::LockContended => "contended",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SeatOp {
    Reserve,
    Rollback,
}

impl SeatOp {
    const fn name(self) -> &'static str {
        match self {
            Self::Reserve => "reserve",
            Self::Rollback => "rollback",
        }
    }
}

/// Lock-serialized owner of event seat counts.
///
/// # Example
///
/// ```ignore
/// let authority = InventoryAuthority::new(store, locks)
///     .with_lock_timing(Duration::from_secs(5), Duration::from_secs(10));
///
/// if authority.reserve_seats(event_id, SeatQuantity::new(2)?).await? {
///     // two seats are now held
/// }
/// ```
pub struct InventoryAuthority {
    store: Arc<dyn InventoryStore>,
    locks: Arc<dyn LockManager>,
    wait_timeout: Duration,
    lease: Duration,
}

impl InventoryAuthority {
    /// Create an authority with a 5s lock wait and a 10s lease.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>, locks: Arc<dyn LockManager>) -> Self {
        Self {
            store,
            locks,
            wait_timeout: Duration::from_secs(5),
            lease: Duration::from_secs(10),
        }
    }

    /// Override the lock wait timeout and lease.
    #[must_use]
    pub const fn with_lock_timing(mut self, wait_timeout: Duration, lease: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self.lease = lease;
        self
    }

    // ------------------------------------------------------------------------
    // Seat operations
    // ------------------------------------------------------------------------

    /// Whether at least `quantity` seats remain. Reads without taking the lock.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidArgument`] if `quantity <= 0` (checked first)
    /// - [`InventoryError::NotFound`] for an unknown event
    pub async fn check_availability(
        &self,
        event_id: EventId,
        quantity: i64,
    ) -> Result<bool, InventoryError> {
        let quantity = SeatQuantity::new(quantity)?;
        let event = self.load(event_id).await?;
        Ok(event.has_enough_seats(quantity))
    }

    /// Take `quantity` seats. `false` means nothing was taken, either because supply
    /// is short or because the lock was contended.
    ///
    /// # Errors
    ///
    /// See [`InventoryAuthority::try_reserve_seats`].
    pub async fn reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> Result<bool, InventoryError> {
        Ok(self.try_reserve_seats(event_id, quantity).await?.is_applied())
    }

    /// Give `quantity` seats back. `false` means the lock was contended.
    ///
    /// # Errors
    ///
    /// See [`InventoryAuthority::try_rollback_reserve_seats`].
    pub async fn rollback_reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> Result<bool, InventoryError> {
        Ok(self
            .try_rollback_reserve_seats(event_id, quantity)
            .await?
            .is_applied())
    }

    /// Take `quantity` seats, reporting why nothing happened when it didn't.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotFound`] for an unknown event
    /// - [`InventoryError::Lock`] if the lock backend failed
    /// - [`InventoryError::Store`] if reading or persisting failed
    pub async fn try_reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> Result<SeatOutcome, InventoryError> {
        self.seat_operation(SeatOp::Reserve, event_id, quantity).await
    }

    /// Give `quantity` seats back, reporting contention.
    ///
    /// No ceiling against the originally published count is applied.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotFound`] for an unknown event
    /// - [`InventoryError::SeatCount`] if the count would overflow
    /// - [`InventoryError::Lock`] / [`InventoryError::Store`] for backend failures
    pub async fn try_rollback_reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> Result<SeatOutcome, InventoryError> {
        self.seat_operation(SeatOp::Rollback, event_id, quantity).await
    }

    async fn seat_operation(
        &self,
        op: SeatOp,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> Result<SeatOutcome, InventoryError> {
        let key = LockKey::for_event(event_id);
        let result = match self.acquire(&key).await {
            Ok(Some(handle)) => {
                let result = self.apply_locked(op, event_id, quantity, &handle).await;
                self.release(&handle).await;
                result
            }
            Ok(None) => {
                tracing::warn!(
                    lock_key = %key,
                    operation = op.name(),
                    %quantity,
                    "Timed out waiting for event lock"
                );
                Ok(SeatOutcome::LockContended)
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => {
                InventoryMetrics::record_operation(op.name(), outcome.label());
                tracing::info!(
                    event_id = %event_id,
                    operation = op.name(),
                    %quantity,
                    outcome = outcome.label(),
                    "Seat operation finished"
                );
            }
            Err(e) => {
                InventoryMetrics::record_operation(op.name(), "error");
                tracing::warn!(
                    event_id = %event_id,
                    operation = op.name(),
                    %quantity,
                    error = %e,
                    "Seat operation failed"
                );
            }
        }
        result
    }

    async fn apply_locked(
        &self,
        op: SeatOp,
        event_id: EventId,
        quantity: SeatQuantity,
        handle: &LockHandle,
    ) -> Result<SeatOutcome, InventoryError> {
        let mut event = self.load(event_id).await?;

        match op {
            SeatOp::Reserve => {
                if !event.has_enough_seats(quantity) {
                    return Ok(SeatOutcome::InsufficientSeats {
                        available: event.remaining_seats(),
                    });
                }
                event.take_seats(quantity, handle)?;
            }
            SeatOp::Rollback => event.return_seats(quantity, handle)?,
        }

        if self.persist(&event, handle).await? {
            Ok(SeatOutcome::Applied)
        } else {
            Ok(SeatOutcome::LockContended)
        }
    }

    // ------------------------------------------------------------------------
    // Event CRUD
    // ------------------------------------------------------------------------

    /// Publish a new event owned by `owner`.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidArgument`] for an empty title or negative seat count
    /// - [`InventoryError::Store`] if persisting failed
    pub async fn create_event(
        &self,
        owner: PrincipalId,
        draft: EventDraft,
    ) -> Result<EventInventory, InventoryError> {
        let seats = draft.validate().map_err(InventoryError::InvalidArgument)?;
        let event = EventInventory::publish(EventId::new(), owner, draft, seats);
        self.store.save(&event).await?;

        tracing::info!(
            event_id = %event.id,
            owner = %event.owner,
            seats,
            "Event created"
        );
        Ok(event)
    }

    /// Load one event.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::NotFound`] for an unknown event.
    pub async fn get_event(&self, event_id: EventId) -> Result<EventInventory, InventoryError> {
        self.load(event_id).await
    }

    /// Every event.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Store`] if the store failed.
    pub async fn list_events(&self) -> Result<Vec<EventInventory>, InventoryError> {
        Ok(self.store.list_all().await?)
    }

    /// Events published by `owner`, latest `starts_at` first.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Store`] if the store failed.
    pub async fn list_events_by_owner(
        &self,
        owner: &PrincipalId,
    ) -> Result<Vec<EventInventory>, InventoryError> {
        Ok(self.store.find_by_owner(owner).await?)
    }

    /// Replace an event's title, description, date and seat count.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidArgument`] for an invalid draft
    /// - [`InventoryError::NotFound`] for an unknown event
    /// - [`InventoryError::Unauthorized`] if `owner` did not publish the event
    /// - [`InventoryError::LockTimeout`] if the event lock was not obtained in time
    pub async fn update_event(
        &self,
        event_id: EventId,
        owner: &PrincipalId,
        draft: EventDraft,
    ) -> Result<EventInventory, InventoryError> {
        let seats = draft.validate().map_err(InventoryError::InvalidArgument)?;
        self.authorize(event_id, owner).await?;

        let handle = self.acquire_for_admin(event_id).await?;
        let result = self.replace_locked(event_id, draft, seats, &handle).await;
        self.release(&handle).await;

        let outcome = if result.is_ok() { "applied" } else { "error" };
        InventoryMetrics::record_operation("update", outcome);
        if let Ok(event) = &result {
            tracing::info!(
                event_id = %event.id,
                owner = %owner,
                seats,
                "Event updated"
            );
        }
        result
    }

    async fn replace_locked(
        &self,
        event_id: EventId,
        draft: EventDraft,
        seats: u64,
        handle: &LockHandle,
    ) -> Result<EventInventory, InventoryError> {
        let mut event = self.load(event_id).await?;
        event.replace_with(draft, seats, handle)?;
        if self.persist(&event, handle).await? {
            Ok(event)
        } else {
            Err(InventoryError::LockTimeout(handle.key().clone()))
        }
    }

    /// Delete an event.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotFound`] for an unknown event
    /// - [`InventoryError::Unauthorized`] if `owner` did not publish the event
    /// - [`InventoryError::LockTimeout`] if the event lock was not obtained in time
    pub async fn delete_event(
        &self,
        event_id: EventId,
        owner: &PrincipalId,
    ) -> Result<(), InventoryError> {
        self.authorize(event_id, owner).await?;

        let handle = self.acquire_for_admin(event_id).await?;
        let result = match self.still_owned(&handle).await {
            Ok(false) => Err(InventoryError::LockTimeout(handle.key().clone())),
            Ok(true) => match self.store.delete(event_id).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(InventoryError::NotFound(event_id)),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e),
        };
        self.release(&handle).await;

        let outcome = if result.is_ok() { "applied" } else { "error" };
        InventoryMetrics::record_operation("delete", outcome);
        if result.is_ok() {
            tracing::info!(event_id = %event_id, owner = %owner, "Event deleted");
        }
        result
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn load(&self, event_id: EventId) -> Result<EventInventory, InventoryError> {
        self.store
            .get(event_id)
            .await?
            .ok_or(InventoryError::NotFound(event_id))
    }

    async fn authorize(&self, event_id: EventId, owner: &PrincipalId) -> Result<(), InventoryError> {
        let event = self.load(event_id).await?;
        if event.is_owned_by(owner) {
            Ok(())
        } else {
            Err(InventoryError::Unauthorized {
                event_id,
                principal: owner.clone(),
            })
        }
    }

    async fn acquire(&self, key: &LockKey) -> Result<Option<LockHandle>, InventoryError> {
        let started = Instant::now();
        let handle = self.locks.acquire(key, self.wait_timeout, self.lease).await?;
        InventoryMetrics::record_lock_wait(started.elapsed());

        if handle.is_some() {
            tracing::debug!(lock_key = %key, waited_ms = started.elapsed().as_millis(), "Lock acquired");
        }
        Ok(handle)
    }

    async fn acquire_for_admin(&self, event_id: EventId) -> Result<LockHandle, InventoryError> {
        let key = LockKey::for_event(event_id);
        match self.acquire(&key).await? {
            Some(handle) => Ok(handle),
            None => {
                tracing::warn!(lock_key = %key, "Timed out waiting for event lock");
                InventoryMetrics::record_operation("admin", "contended");
                Err(InventoryError::LockTimeout(key))
            }
        }
    }

    async fn release(&self, handle: &LockHandle) {
        match self.locks.release(handle).await {
            Ok(()) => tracing::debug!(lock_key = %handle.key(), "Lock released"),
            // The lease still bounds how long the key stays blocked.
            Err(e) => tracing::warn!(lock_key = %handle.key(), error = %e, "Failed to release lock"),
        }
    }

    /// Whether `handle` may still write: its lease has not run out and the backend
    /// still records it as the owner.
    async fn still_owned(&self, handle: &LockHandle) -> Result<bool, InventoryError> {
        if handle.lease_expired() {
            tracing::warn!(lock_key = %handle.key(), "Lock lease expired before write");
            return Ok(false);
        }
        if !self.locks.is_held(handle).await? {
            tracing::warn!(lock_key = %handle.key(), "Lock no longer held by this holder");
            return Ok(false);
        }
        Ok(true)
    }

    /// Persist `event` if the lock is still ours. Returns `false` when it was lost.
    async fn persist(&self, event: &EventInventory, handle: &LockHandle) -> Result<bool, InventoryError> {
        if !self.still_owned(handle).await? {
            tracing::warn!(event_id = %event.id, "Discarding mutation");
            return Ok(false);
        }
        self.store.save(event).await?;
        Ok(true)
    }
}

fn into_client_error(err: InventoryError) -> ClientError {
    match err {
        InventoryError::NotFound(id) => ClientError::NotFound(id),
        InventoryError::InvalidArgument(message) => ClientError::InvalidArgument(message),
        e @ (InventoryError::LockTimeout(_) | InventoryError::Lock(_)) => ClientError::Remote {
            status: 503,
            message: e.to_string(),
        },
        e => ClientError::Remote {
            status: 500,
            message: e.to_string(),
        },
    }
}

/// In-process wiring: the orchestrator can drive an authority directly.
impl InventoryClient for InventoryAuthority {
    fn get_inventory(&self, event_id: EventId) -> BoxFuture<'_, Result<EventInventory, ClientError>> {
        Box::pin(async move { self.get_event(event_id).await.map_err(into_client_error) })
    }

    fn check_availability(
        &self,
        event_id: EventId,
        quantity: i64,
    ) -> BoxFuture<'_, Result<bool, ClientError>> {
        Box::pin(async move {
            InventoryAuthority::check_availability(self, event_id, quantity)
                .await
                .map_err(into_client_error)
        })
    }

    fn reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> BoxFuture<'_, Result<bool, ClientError>> {
        Box::pin(async move {
            InventoryAuthority::reserve_seats(self, event_id, quantity)
                .await
                .map_err(into_client_error)
        })
    }

    fn rollback_reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> BoxFuture<'_, Result<bool, ClientError>> {
        Box::pin(async move {
            InventoryAuthority::rollback_reserve_seats(self, event_id, quantity)
                .await
                .map_err(into_client_error)
        })
    }
}
