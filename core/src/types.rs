//! Domain types for the seat inventory protocol.
//!
//! Identifiers, quantities, the event inventory record owned by the Inventory
//! Authority, and the reservation record owned by the Reservation Orchestrator.

use crate::error::{ReservationError, SeatCountError};
use crate::lock::{LockHandle, LockKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random `ReservationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ReservationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when parsing an empty principal identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Principal identifier must not be empty")]
pub struct EmptyPrincipal;

/// Identity of a caller: an event owner or a reservation requester.
///
/// Principals arrive out-of-band (an `X-User` header) and are compared verbatim.
///
/// # Examples
///
/// ```
/// use boxoffice_core::PrincipalId;
///
/// let owner: PrincipalId = "a@x.com".parse().unwrap();
/// assert_eq!(owner.as_str(), "a@x.com");
/// assert!("".parse::<PrincipalId>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Create a principal from trusted input (no validation).
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the principal as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PrincipalId {
    type Err = EmptyPrincipal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EmptyPrincipal);
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Quantities
// ============================================================================

/// Error returned for a zero or negative seat quantity.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid quantity {0}: must be a positive integer")]
pub struct InvalidQuantity(pub i64);

/// A strictly positive number of seats.
///
/// Requests carry signed integers on the wire; conversion rejects anything `<= 0`,
/// so code holding a `SeatQuantity` never has to re-check it.
///
/// # Examples
///
/// ```
/// use boxoffice_core::SeatQuantity;
///
/// assert_eq!(SeatQuantity::new(3).unwrap().get(), 3);
/// assert!(SeatQuantity::new(0).is_err());
/// assert!(SeatQuantity::new(-2).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u64")]
pub struct SeatQuantity(u64);

impl SeatQuantity {
    /// Validate a raw quantity.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidQuantity`] if `raw <= 0`.
    pub fn new(raw: i64) -> Result<Self, InvalidQuantity> {
        u64::try_from(raw)
            .ok()
            .filter(|q| *q > 0)
            .map(Self)
            .ok_or(InvalidQuantity(raw))
    }

    /// The number of seats.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<i64> for SeatQuantity {
    type Error = InvalidQuantity;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<SeatQuantity> for u64 {
    fn from(quantity: SeatQuantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for SeatQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event inventory
// ============================================================================

/// Owner-supplied contents of an event: used for both create and full-replace update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Event title
    pub title: String,
    /// Free-form description
    pub description: String,
    /// When the event takes place
    pub starts_at: DateTime<Utc>,
    /// Seat count to publish (must not be negative)
    pub seat_count: i64,
}

impl EventDraft {
    /// Validate the draft and return the seat count as an unsigned value.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<u64, String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        u64::try_from(self.seat_count)
            .map_err(|_| format!("seat count must not be negative, got {}", self.seat_count))
    }
}

/// An event and its remaining-seat count.
///
/// The count is private: it changes only through [`EventInventory::take_seats`],
/// [`EventInventory::return_seats`] and [`EventInventory::replace_with`], each of which
/// demands the [`LockHandle`] for this event's [`LockKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInventory {
    /// Event identifier
    pub id: EventId,
    /// Event title
    pub title: String,
    /// Free-form description
    pub description: String,
    /// When the event takes place
    pub starts_at: DateTime<Utc>,
    /// Principal that published the event
    pub owner: PrincipalId,
    remaining_seats: u64,
}

impl EventInventory {
    /// Publish a new event from a validated seat count.
    #[must_use]
    pub fn publish(id: EventId, owner: PrincipalId, draft: EventDraft, seats: u64) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            starts_at: draft.starts_at,
            owner,
            remaining_seats: seats,
        }
    }

    /// Rebuild a record loaded from storage.
    #[must_use]
    pub const fn restore(
        id: EventId,
        title: String,
        description: String,
        starts_at: DateTime<Utc>,
        owner: PrincipalId,
        remaining_seats: u64,
    ) -> Self {
        Self {
            id,
            title,
            description,
            starts_at,
            owner,
            remaining_seats,
        }
    }

    /// Seats still available.
    #[must_use]
    pub const fn remaining_seats(&self) -> u64 {
        self.remaining_seats
    }

    /// Whether `quantity` seats could be taken right now.
    #[must_use]
    pub const fn has_enough_seats(&self, quantity: SeatQuantity) -> bool {
        self.remaining_seats >= quantity.get()
    }

    /// Whether `principal` published this event.
    #[must_use]
    pub fn is_owned_by(&self, principal: &PrincipalId) -> bool {
        &self.owner == principal
    }

    /// The lock key serializing mutations of this event.
    #[must_use]
    pub fn lock_key(&self) -> LockKey {
        LockKey::for_event(self.id)
    }

    /// Decrement the remaining count.
    ///
    /// # Errors
    ///
    /// - [`SeatCountError::WrongLock`] if `held` guards another key
    /// - [`SeatCountError::Insufficient`] if fewer than `quantity` seats remain
    pub fn take_seats(
        &mut self,
        quantity: SeatQuantity,
        held: &LockHandle,
    ) -> Result<(), SeatCountError> {
        self.check_lock(held)?;
        self.remaining_seats = self
            .remaining_seats
            .checked_sub(quantity.get())
            .ok_or(SeatCountError::Insufficient {
                requested: quantity.get(),
                available: self.remaining_seats,
            })?;
        Ok(())
    }

    /// Increment the remaining count (rollback of a previous take).
    ///
    /// No upper bound against the originally published count is applied.
    ///
    /// # Errors
    ///
    /// - [`SeatCountError::WrongLock`] if `held` guards another key
    /// - [`SeatCountError::Overflow`] if the count would exceed `u64::MAX`
    pub fn return_seats(
        &mut self,
        quantity: SeatQuantity,
        held: &LockHandle,
    ) -> Result<(), SeatCountError> {
        self.check_lock(held)?;
        self.remaining_seats = self
            .remaining_seats
            .checked_add(quantity.get())
            .ok_or(SeatCountError::Overflow)?;
        Ok(())
    }

    /// Full replace of the owner-editable fields, including the seat count.
    ///
    /// # Errors
    ///
    /// Returns [`SeatCountError::WrongLock`] if `held` guards another key.
    pub fn replace_with(
        &mut self,
        draft: EventDraft,
        seats: u64,
        held: &LockHandle,
    ) -> Result<(), SeatCountError> {
        self.check_lock(held)?;
        self.title = draft.title;
        self.description = draft.description;
        self.starts_at = draft.starts_at;
        self.remaining_seats = seats;
        Ok(())
    }

    fn check_lock(&self, held: &LockHandle) -> Result<(), SeatCountError> {
        let expected = self.lock_key();
        if held.key() == &expected {
            Ok(())
        } else {
            Err(SeatCountError::WrongLock {
                expected,
                actual: held.key().clone(),
            })
        }
    }
}

// ============================================================================
// Reservations
// ============================================================================

/// Lifecycle of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Seats are held remotely, booking not yet finalized
    Pending,
    /// Booking finalized
    Confirmed,
    /// Seats released; terminal
    Cancelled,
}

impl ReservationStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether the reservation still holds seats.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("Invalid reservation status: {other}")),
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which status a freshly created reservation starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationWorkflow {
    /// Seats held and booking finalized in one step (`CONFIRMED`)
    #[default]
    ConfirmImmediately,
    /// Seats held (`PENDING`); an explicit confirm step finalizes the booking
    HoldThenConfirm,
}

impl ReservationWorkflow {
    /// Status assigned on successful creation.
    #[must_use]
    pub const fn initial_status(self) -> ReservationStatus {
        match self {
            Self::ConfirmImmediately => ReservationStatus::Confirmed,
            Self::HoldThenConfirm => ReservationStatus::Pending,
        }
    }
}

impl FromStr for ReservationWorkflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "confirm" | "confirm_immediately" => Ok(Self::ConfirmImmediately),
            "hold" | "hold_then_confirm" => Ok(Self::HoldThenConfirm),
            other => Err(format!("Unknown reservation workflow: {other}")),
        }
    }
}

/// A successful seat hold by a requester against an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identifier
    pub id: ReservationId,
    /// Event the seats were taken from
    pub event_id: EventId,
    /// Principal holding the seats
    pub requester: PrincipalId,
    quantity: SeatQuantity,
    status: ReservationStatus,
    /// When the reservation was created
    pub reserved_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Open a reservation after the remote seat hold succeeded.
    #[must_use]
    pub fn open(
        event_id: EventId,
        requester: PrincipalId,
        quantity: SeatQuantity,
        workflow: ReservationWorkflow,
        reserved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            event_id,
            requester,
            quantity,
            status: workflow.initial_status(),
            reserved_at,
            cancelled_at: None,
        }
    }

    /// Rebuild a record loaded from storage.
    #[must_use]
    pub const fn restore(
        id: ReservationId,
        event_id: EventId,
        requester: PrincipalId,
        quantity: SeatQuantity,
        status: ReservationStatus,
        reserved_at: DateTime<Utc>,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            event_id,
            requester,
            quantity,
            status,
            reserved_at,
            cancelled_at,
        }
    }

    /// Seats held; fixed at creation.
    #[must_use]
    pub const fn quantity(&self) -> SeatQuantity {
        self.quantity
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ReservationStatus {
        self.status
    }

    /// When the reservation was cancelled, if it was.
    #[must_use]
    pub const fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    /// Whether `principal` holds this reservation.
    #[must_use]
    pub fn is_owned_by(&self, principal: &PrincipalId) -> bool {
        &self.requester == principal
    }

    /// Move `PENDING` to `CONFIRMED`. Returns `false` if it was already confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::AlreadyCancelled`] for a cancelled reservation.
    pub fn confirm(&mut self) -> Result<bool, ReservationError> {
        match self.status {
            ReservationStatus::Pending => {
                self.status = ReservationStatus::Confirmed;
                Ok(true)
            }
            ReservationStatus::Confirmed => Ok(false),
            ReservationStatus::Cancelled => Err(ReservationError::AlreadyCancelled(self.id)),
        }
    }

    /// Mark the reservation cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::AlreadyCancelled`] if it is already cancelled.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<(), ReservationError> {
        if !self.status.is_active() {
            return Err(ReservationError::AlreadyCancelled(self.id));
        }
        self.status = ReservationStatus::Cancelled;
        self.cancelled_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn draft(seats: i64) -> EventDraft {
        EventDraft {
            title: "Spring Concert".to_string(),
            description: "Main hall".to_string(),
            starts_at: Utc::now(),
            seat_count: seats,
        }
    }

    fn event(seats: u64) -> EventInventory {
        EventInventory::publish(EventId::new(), PrincipalId::new("owner@x.com"), draft(0), seats)
    }

    fn handle_for(event: &EventInventory) -> LockHandle {
        LockHandle::new(event.lock_key(), "token", Duration::from_secs(10))
    }

    fn qty(n: i64) -> SeatQuantity {
        SeatQuantity::new(n).unwrap()
    }

    #[test]
    fn test_has_enough_seats() {
        let event = event(100);
        assert!(event.has_enough_seats(qty(50)));
        assert!(event.has_enough_seats(qty(100)));
        assert!(!event.has_enough_seats(qty(150)));
    }

    #[tokio::test]
    async fn test_take_seats_decrements() {
        let mut event = event(100);
        let held = handle_for(&event);
        event.take_seats(qty(30), &held).unwrap();
        assert_eq!(event.remaining_seats(), 70);
    }

    #[tokio::test]
    async fn test_take_seats_refuses_to_go_negative() {
        let mut event = event(5);
        let held = handle_for(&event);
        let err = event.take_seats(qty(6), &held).unwrap_err();
        assert_eq!(
            err,
            SeatCountError::Insufficient {
                requested: 6,
                available: 5
            }
        );
        assert_eq!(event.remaining_seats(), 5);
    }

    #[tokio::test]
    async fn test_mutation_requires_matching_lock() {
        let mut event = event(10);
        let other = LockHandle::new(LockKey::for_event(EventId::new()), "t", Duration::from_secs(1));
        assert!(matches!(
            event.take_seats(qty(1), &other),
            Err(SeatCountError::WrongLock { .. })
        ));
        assert!(matches!(
            event.return_seats(qty(1), &other),
            Err(SeatCountError::WrongLock { .. })
        ));
        assert_eq!(event.remaining_seats(), 10);
    }

    #[tokio::test]
    async fn test_return_seats_overflow_is_an_error() {
        let mut event = event(u64::MAX - 1);
        let held = handle_for(&event);
        assert_eq!(event.return_seats(qty(2), &held), Err(SeatCountError::Overflow));
        assert_eq!(event.remaining_seats(), u64::MAX - 1);
    }

    #[test]
    fn test_draft_validation() {
        assert_eq!(draft(10).validate(), Ok(10));
        assert!(draft(-1).validate().is_err());
        let mut untitled = draft(10);
        untitled.title = "  ".to_string();
        assert!(untitled.validate().is_err());
    }

    #[test]
    fn test_quantity_serde_rejects_non_positive() {
        assert!(serde_json::from_str::<SeatQuantity>("0").is_err());
        assert!(serde_json::from_str::<SeatQuantity>("-4").is_err());
        assert_eq!(serde_json::from_str::<SeatQuantity>("4").unwrap().get(), 4);
    }

    #[test]
    fn test_workflow_initial_status() {
        assert_eq!(
            ReservationWorkflow::ConfirmImmediately.initial_status(),
            ReservationStatus::Confirmed
        );
        assert_eq!(
            ReservationWorkflow::HoldThenConfirm.initial_status(),
            ReservationStatus::Pending
        );
        assert_eq!("hold".parse(), Ok(ReservationWorkflow::HoldThenConfirm));
    }

    #[test]
    fn test_reservation_status_is_monotone() {
        let mut reservation = Reservation::open(
            EventId::new(),
            PrincipalId::new("a@x.com"),
            qty(2),
            ReservationWorkflow::HoldThenConfirm,
            Utc::now(),
        );
        assert_eq!(reservation.status(), ReservationStatus::Pending);
        assert!(reservation.confirm().unwrap());
        assert!(!reservation.confirm().unwrap());

        let at = Utc::now();
        reservation.cancel(at).unwrap();
        assert_eq!(reservation.status(), ReservationStatus::Cancelled);
        assert_eq!(reservation.cancelled_at(), Some(at));

        assert!(matches!(
            reservation.cancel(Utc::now()),
            Err(ReservationError::AlreadyCancelled(_))
        ));
        assert!(matches!(
            reservation.confirm(),
            Err(ReservationError::AlreadyCancelled(_))
        ));
        assert_eq!(reservation.cancelled_at(), Some(at));
        assert_eq!(reservation.quantity().get(), 2);
    }

    #[test]
    fn test_status_round_trips_through_storage_form() {
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<ReservationStatus>(), Ok(status));
        }
    }

    proptest! {
        #[test]
        fn prop_non_positive_quantities_rejected(raw in i64::MIN..=0_i64) {
            prop_assert_eq!(SeatQuantity::new(raw), Err(InvalidQuantity(raw)));
        }

        #[test]
        fn prop_take_then_return_restores_count(start in 0_u64..1_000_000, q in 1_i64..1_000_000) {
            let mut event = event(start);
            let held = handle_for(&event);
            let quantity = qty(q);
            if event.take_seats(quantity, &held).is_ok() {
                event.return_seats(quantity, &held).unwrap();
            }
            prop_assert_eq!(event.remaining_seats(), start);
        }
    }
}
