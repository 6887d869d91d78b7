//! The Reservation Orchestrator saga.
//!
//! ```text
//! START --reserve(remote)=false--> FAILED (no local record)
//! START --reserve(remote)=true---> RESERVED --persist--> PENDING | CONFIRMED
//! RESERVED --persist fails-------> COMPENSATING --rollback(remote)--> FAILED
//! ```
//!
//! Compensation asymmetry: a rollback that fails while undoing a create is logged and
//! counted but the caller only sees the original persistence error. A rollback that
//! fails while cancelling is surfaced and the reservation keeps its status.

use boxoffice_core::environment::Clock;
use boxoffice_core::{
    ClientError, DateTime, EventId, InventoryClient, PrincipalId, Reservation,
    ReservationError, ReservationId, ReservationStatus, ReservationStore, ReservationWorkflow,
    SeatQuantity, Utc,
};
use boxoffice_runtime::metrics::SagaMetrics;
use boxoffice_runtime::{RetryPolicy, TaskHandle, WorkerPool, retry_with_backoff};
use boxoffice_web::{current_correlation_id, with_correlation_id};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Reservation as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationResponse {
    /// Reservation ID
    pub id: ReservationId,
    /// Event the seats belong to
    pub event_id: EventId,
    /// Holder
    pub requester: String,
    /// Seats held
    pub quantity: u64,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Creation time
    pub reserved_at: DateTime<Utc>,
    /// Cancellation time, once cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            id: reservation.id,
            event_id: reservation.event_id,
            quantity: reservation.quantity().get(),
            status: reservation.status(),
            cancelled_at: reservation.cancelled_at(),
            reserved_at: reservation.reserved_at,
            requester: reservation.requester.to_string(),
        }
    }
}

/// Outcome of the last compensating rollback attempt.
#[derive(Error, Debug)]
enum RollbackFailure {
    #[error("inventory declined the rollback")]
    Declined,
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Reserves seats remotely, records reservations, and compensates failures.
///
/// Cheap to clone; clones share the same collaborators and worker pool.
#[derive(Clone)]
pub struct ReservationOrchestrator {
    inventory: Arc<dyn InventoryClient>,
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    workflow: ReservationWorkflow,
    compensation: RetryPolicy,
    workers: WorkerPool,
}

impl ReservationOrchestrator {
    /// Create an orchestrator with the default workflow, no compensation retries and
    /// a 16-slot worker pool.
    #[must_use]
    pub fn new(
        inventory: Arc<dyn InventoryClient>,
        store: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inventory,
            store,
            clock,
            workflow: ReservationWorkflow::default(),
            compensation: RetryPolicy::none(),
            workers: WorkerPool::new("reservations", 16),
        }
    }

    /// Status new reservations start in.
    #[must_use]
    pub const fn with_workflow(mut self, workflow: ReservationWorkflow) -> Self {
        self.workflow = workflow;
        self
    }

    /// Retry policy for compensating rollbacks.
    #[must_use]
    pub fn with_compensation_policy(mut self, policy: RetryPolicy) -> Self {
        self.compensation = policy;
        self
    }

    /// Worker pool used by [`ReservationOrchestrator::create_reservation_async`].
    #[must_use]
    pub fn with_workers(mut self, workers: WorkerPool) -> Self {
        self.workers = workers;
        self
    }

    /// Reserve `quantity` seats on `event_id` for `requester` and record it.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidArgument`] if `quantity <= 0` (no remote call)
    /// - [`ReservationError::InsufficientInventory`] if the authority declined
    /// - [`ReservationError::Inventory`] if the reserve call failed; nothing is compensated
    /// - [`ReservationError::Store`] if recording failed, after the seats were rolled back
    pub async fn create_reservation(
        &self,
        event_id: EventId,
        requester: PrincipalId,
        quantity: i64,
    ) -> Result<ReservationResponse, ReservationError> {
        let quantity = SeatQuantity::new(quantity)?;

        let reserved = match self.inventory.reserve_seats(event_id, quantity).await {
            Ok(reserved) => reserved,
            Err(e) => {
                SagaMetrics::record_step("create", "error");
                tracing::warn!(
                    event_id = %event_id,
                    requester = %requester,
                    %quantity,
                    error = %e,
                    "Seat reservation call failed"
                );
                return Err(e.into());
            }
        };

        if !reserved {
            SagaMetrics::record_step("create", "rejected");
            tracing::info!(
                event_id = %event_id,
                requester = %requester,
                %quantity,
                "Inventory declined reservation"
            );
            return Err(ReservationError::InsufficientInventory { event_id, quantity });
        }

        let reservation = Reservation::open(event_id, requester, quantity, self.workflow, self.clock.now());

        if let Err(e) = self.store.save(&reservation).await {
            tracing::error!(
                reservation_id = %reservation.id,
                event_id = %event_id,
                %quantity,
                error = %e,
                "Failed to record reservation; compensating"
            );
            self.compensate_create(event_id, quantity).await;
            SagaMetrics::record_step("create", "compensated");
            return Err(e.into());
        }

        SagaMetrics::record_step("create", "applied");
        tracing::info!(
            reservation_id = %reservation.id,
            event_id = %event_id,
            requester = %reservation.requester,
            %quantity,
            status = %reservation.status(),
            "Reservation created"
        );
        Ok(reservation.into())
    }

    /// Run [`ReservationOrchestrator::create_reservation`] on the worker pool.
    ///
    /// Dropping the handle does not cancel the saga: the remote reserve and any
    /// compensation run to completion. The caller's correlation id follows the saga
    /// onto the pool.
    pub fn create_reservation_async(
        &self,
        event_id: EventId,
        requester: PrincipalId,
        quantity: i64,
    ) -> TaskHandle<Result<ReservationResponse, ReservationError>> {
        let orchestrator = self.clone();
        let correlation_id = current_correlation_id();
        self.workers.submit(async move {
            let saga = orchestrator.create_reservation(event_id, requester, quantity);
            match correlation_id {
                Some(id) => with_correlation_id(id, saga).await,
                None => saga.await,
            }
        })
    }

    /// Cancel a reservation and give its seats back.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] for an unknown reservation
    /// - [`ReservationError::Unauthorized`] if `requester` does not hold it
    /// - [`ReservationError::AlreadyCancelled`] if it is already cancelled
    /// - [`ReservationError::CompensationFailed`] if the authority declined the
    ///   rollback; the status is unchanged
    /// - [`ReservationError::Inventory`] if the rollback call failed; the status is
    ///   unchanged
    pub async fn cancel_reservation(
        &self,
        reservation_id: ReservationId,
        requester: &PrincipalId,
    ) -> Result<ReservationResponse, ReservationError> {
        let mut reservation = self.load_owned(reservation_id, requester).await?;
        if reservation.status() == ReservationStatus::Cancelled {
            return Err(ReservationError::AlreadyCancelled(reservation_id));
        }

        match self.rollback(reservation.event_id, reservation.quantity()).await {
            Ok(()) => SagaMetrics::record_compensation("cancel", "applied"),
            Err(RollbackFailure::Declined) => {
                SagaMetrics::record_compensation("cancel", "declined");
                SagaMetrics::record_step("cancel", "error");
                tracing::error!(
                    reservation_id = %reservation_id,
                    event_id = %reservation.event_id,
                    quantity = %reservation.quantity(),
                    "Inventory declined seat release; reservation left unchanged"
                );
                return Err(ReservationError::CompensationFailed {
                    reservation_id,
                    status: reservation.status(),
                });
            }
            Err(RollbackFailure::Client(e)) => {
                SagaMetrics::record_compensation("cancel", "error");
                SagaMetrics::record_step("cancel", "error");
                tracing::error!(
                    reservation_id = %reservation_id,
                    event_id = %reservation.event_id,
                    error = %e,
                    "Seat release call failed; reservation left unchanged"
                );
                return Err(e.into());
            }
        }

        reservation.cancel(self.clock.now())?;
        if let Err(e) = self.store.save(&reservation).await {
            // Seats are already back on sale at this point.
            tracing::error!(
                reservation_id = %reservation_id,
                event_id = %reservation.event_id,
                error = %e,
                "Seats released but cancellation could not be recorded"
            );
            SagaMetrics::record_step("cancel", "error");
            return Err(e.into());
        }

        SagaMetrics::record_step("cancel", "applied");
        tracing::info!(
            reservation_id = %reservation_id,
            requester = %requester,
            quantity = %reservation.quantity(),
            "Reservation cancelled"
        );
        Ok(reservation.into())
    }

    /// Finalize a `PENDING` reservation. Confirming a confirmed one is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] / [`ReservationError::Unauthorized`]
    /// - [`ReservationError::AlreadyCancelled`] for a cancelled reservation
    pub async fn confirm_reservation(
        &self,
        reservation_id: ReservationId,
        requester: &PrincipalId,
    ) -> Result<ReservationResponse, ReservationError> {
        let mut reservation = self.load_owned(reservation_id, requester).await?;
        if reservation.confirm()? {
            self.store.save(&reservation).await?;
            SagaMetrics::record_step("confirm", "applied");
            tracing::info!(reservation_id = %reservation_id, "Reservation confirmed");
        }
        Ok(reservation.into())
    }

    /// Load one reservation.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::NotFound`] for an unknown reservation.
    pub async fn get_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReservationResponse, ReservationError> {
        Ok(self.load(reservation_id).await?.into())
    }

    /// Reservations held by `requester`, oldest first. Empty if none.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Store`] if the store failed.
    pub async fn find_by_requester(
        &self,
        requester: &PrincipalId,
    ) -> Result<Vec<ReservationResponse>, ReservationError> {
        let reservations = self.store.find_by_requester(requester).await?;
        Ok(reservations.into_iter().map(Into::into).collect())
    }

    /// Reservations against `event_id`, oldest first. Empty if none.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Store`] if the store failed.
    pub async fn find_by_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<ReservationResponse>, ReservationError> {
        let reservations = self.store.find_by_event(event_id).await?;
        Ok(reservations.into_iter().map(Into::into).collect())
    }

    /// Ask the authority whether `quantity` seats remain.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidArgument`] if `quantity <= 0` (no remote call)
    /// - [`ReservationError::Inventory`] if the call failed
    pub async fn check_availability(
        &self,
        event_id: EventId,
        quantity: i64,
    ) -> Result<bool, ReservationError> {
        SeatQuantity::new(quantity)?;
        Ok(self.inventory.check_availability(event_id, quantity).await?)
    }

    async fn load(&self, reservation_id: ReservationId) -> Result<Reservation, ReservationError> {
        self.store
            .get(reservation_id)
            .await?
            .ok_or(ReservationError::NotFound(reservation_id))
    }

    async fn load_owned(
        &self,
        reservation_id: ReservationId,
        requester: &PrincipalId,
    ) -> Result<Reservation, ReservationError> {
        let reservation = self.load(reservation_id).await?;
        if reservation.is_owned_by(requester) {
            Ok(reservation)
        } else {
            Err(ReservationError::Unauthorized {
                reservation_id,
                principal: requester.clone(),
            })
        }
    }

    async fn rollback(&self, event_id: EventId, quantity: SeatQuantity) -> Result<(), RollbackFailure> {
        retry_with_backoff(&self.compensation, || async move {
            match self.inventory.rollback_reserve_seats(event_id, quantity).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(RollbackFailure::Declined),
                Err(e) => Err(RollbackFailure::Client(e)),
            }
        })
        .await
    }

    async fn compensate_create(&self, event_id: EventId, quantity: SeatQuantity) {
        match self.rollback(event_id, quantity).await {
            Ok(()) => {
                SagaMetrics::record_compensation("create", "applied");
                tracing::info!(event_id = %event_id, %quantity, "Compensating rollback applied");
            }
            Err(e) => {
                SagaMetrics::record_compensation("create", "failed");
                tracing::error!(
                    event_id = %event_id,
                    %quantity,
                    error = %e,
                    "Compensating rollback failed; seats remain held"
                );
            }
        }
    }
}
