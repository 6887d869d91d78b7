use boxoffice_core::{
    BoxFuture, ClientError, EventId, EventInventory, InventoryClient, SeatQuantity,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A call received by [`ScriptedInventoryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryCall {
    /// `get_inventory`
    Get(EventId),
    /// `check_availability`
    CheckAvailability(EventId, i64),
    /// `reserve_seats`
    Reserve(EventId, SeatQuantity),
    /// `rollback_reserve_seats`
    Rollback(EventId, SeatQuantity),
}

type Answer = Result<bool, ClientError>;

#[derive(Debug)]
struct Script {
    events: HashMap<EventId, EventInventory>,
    availability: Answer,
    reserve: Answer,
    reserve_queue: VecDeque<Answer>,
    rollback: Answer,
    rollback_queue: VecDeque<Answer>,
    reserve_delay: Duration,
    calls: Vec<InventoryCall>,
}

/// Programmable [`InventoryClient`].
///
/// Every answer defaults to `Ok(true)`. Queued answers are consumed first, then the
/// standing answer applies. Every call is logged in order.
#[derive(Debug)]
pub struct ScriptedInventoryClient {
    script: Mutex<Script>,
}

impl Default for ScriptedInventoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedInventoryClient {
    /// A client that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                events: HashMap::new(),
                availability: Ok(true),
                reserve: Ok(true),
                reserve_queue: VecDeque::new(),
                rollback: Ok(true),
                rollback_queue: VecDeque::new(),
                reserve_delay: Duration::ZERO,
                calls: Vec::new(),
            }),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve `event` from `get_inventory`.
    pub fn with_event(&self, event: EventInventory) {
        self.script().events.insert(event.id, event);
    }

    /// Standing answer for `check_availability` with a positive quantity.
    pub fn answer_availability(&self, answer: Answer) {
        self.script().availability = answer;
    }

    /// Standing answer for `reserve_seats`.
    pub fn answer_reserve(&self, answer: Answer) {
        self.script().reserve = answer;
    }

    /// One-shot answer for the next unanswered `reserve_seats`.
    pub fn queue_reserve(&self, answer: Answer) {
        self.script().reserve_queue.push_back(answer);
    }

    /// Standing answer for `rollback_reserve_seats`.
    pub fn answer_rollback(&self, answer: Answer) {
        self.script().rollback = answer;
    }

    /// One-shot answer for the next unanswered `rollback_reserve_seats`.
    pub fn queue_rollback(&self, answer: Answer) {
        self.script().rollback_queue.push_back(answer);
    }

    /// Delay every `reserve_seats` answer (honours paused tokio time).
    pub fn delay_reserve(&self, delay: Duration) {
        self.script().reserve_delay = delay;
    }

    /// All calls so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<InventoryCall> {
        self.script().calls.clone()
    }

    /// Quantities passed to `reserve_seats`.
    #[must_use]
    pub fn reserve_calls(&self) -> Vec<(EventId, SeatQuantity)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                InventoryCall::Reserve(id, q) => Some((id, q)),
                _ => None,
            })
            .collect()
    }

    /// Quantities passed to `rollback_reserve_seats`.
    #[must_use]
    pub fn rollback_calls(&self) -> Vec<(EventId, SeatQuantity)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                InventoryCall::Rollback(id, q) => Some((id, q)),
                _ => None,
            })
            .collect()
    }
}

impl InventoryClient for ScriptedInventoryClient {
    fn get_inventory(&self, event_id: EventId) -> BoxFuture<'_, Result<EventInventory, ClientError>> {
        Box::pin(async move {
            let mut script = self.script();
            script.calls.push(InventoryCall::Get(event_id));
            script
                .events
                .get(&event_id)
                .cloned()
                .ok_or(ClientError::NotFound(event_id))
        })
    }

    fn check_availability(
        &self,
        event_id: EventId,
        quantity: i64,
    ) -> BoxFuture<'_, Result<bool, ClientError>> {
        Box::pin(async move {
            let mut script = self.script();
            script
                .calls
                .push(InventoryCall::CheckAvailability(event_id, quantity));
            if quantity <= 0 {
                return Err(ClientError::InvalidArgument(format!(
                    "quantity must be positive, got {quantity}"
                )));
            }
            script.availability.clone()
        })
    }

    fn reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> BoxFuture<'_, Result<bool, ClientError>> {
        Box::pin(async move {
            let (answer, delay) = {
                let mut script = self.script();
                script.calls.push(InventoryCall::Reserve(event_id, quantity));
                let answer = script
                    .reserve_queue
                    .pop_front()
                    .unwrap_or_else(|| script.reserve.clone());
                (answer, script.reserve_delay)
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            answer
        })
    }

    fn rollback_reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> BoxFuture<'_, Result<bool, ClientError>> {
        Box::pin(async move {
            let mut script = self.script();
            script.calls.push(InventoryCall::Rollback(event_id, quantity));
            script
                .rollback_queue
                .pop_front()
                .unwrap_or_else(|| script.rollback.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn test_queued_answers_precede_standing_answer() {
        let client = ScriptedInventoryClient::new();
        client.answer_rollback(Ok(false));
        client.queue_rollback(Err(ClientError::Transport("reset".to_string())));

        let event = EventId::new();
        let q = SeatQuantity::new(1).unwrap();
        assert!(client.rollback_reserve_seats(event, q).await.is_err());
        assert_eq!(client.rollback_reserve_seats(event, q).await, Ok(false));
        assert_eq!(client.rollback_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_check_availability_rejects_non_positive() {
        let client = ScriptedInventoryClient::new();
        let event = EventId::new();
        assert!(matches!(
            client.check_availability(event, 0).await,
            Err(ClientError::InvalidArgument(_))
        ));
        assert_eq!(client.check_availability(event, 3).await, Ok(true));
    }

    #[tokio::test]
    async fn test_unknown_event_is_not_found() {
        let client = ScriptedInventoryClient::new();
        let event = EventId::new();
        assert_eq!(
            client.get_inventory(event).await,
            Err(ClientError::NotFound(event))
        );
    }
}
