//! HTTP binding for the Reservation Orchestrator.
//!
//! - `POST   /reservations` create (caller becomes requester) → 201
//! - `GET    /reservations/user` list the caller's reservations
//! - `GET    /reservations/event/:event_id` list by event
//! - `GET    /reservations/availability?event_id=&quantity=` → `bool`
//! - `GET    /reservations/:id` get
//! - `DELETE /reservations/:id` cancel (requester only)
//! - `POST   /reservations/:id/confirm` confirm a pending hold (requester only)

use crate::orchestrator::{ReservationOrchestrator, ReservationResponse};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use boxoffice_core::{EventId, ReservationError, ReservationId};
use boxoffice_web::{
    CallerIdentity, CorrelationId, WebResult, correlation_id_layer, observability_routes,
    with_correlation_id,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

/// Body of `POST /reservations`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreateReservationRequest {
    /// Event to reserve on
    pub event_id: EventId,
    /// Requested seats; must be positive
    pub quantity: i64,
}

/// `?event_id=&quantity=` on the availability endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AvailabilityQuery {
    /// Event to check
    pub event_id: EventId,
    /// Requested seats; must be positive
    pub quantity: i64,
}

/// Build the reservation service router, including `/health` and `/metrics`.
pub fn build_router(
    orchestrator: ReservationOrchestrator,
    metrics: Option<PrometheusHandle>,
) -> Router {
    Router::new()
        .route("/reservations", post(create_reservation))
        .route("/reservations/user", get(list_my_reservations))
        .route("/reservations/event/:event_id", get(list_event_reservations))
        .route("/reservations/availability", get(check_availability))
        .route(
            "/reservations/:id",
            get(get_reservation).delete(cancel_reservation),
        )
        .route("/reservations/:id/confirm", post(confirm_reservation))
        .with_state(orchestrator)
        .merge(observability_routes(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}

async fn create_reservation(
    State(orchestrator): State<ReservationOrchestrator>,
    CallerIdentity(requester): CallerIdentity,
    CorrelationId(correlation_id): CorrelationId,
    Json(request): Json<CreateReservationRequest>,
) -> WebResult<(StatusCode, Json<ReservationResponse>)> {
    // A dropped request does not abort the saga once it is on the pool.
    let reservation = with_correlation_id(correlation_id, async move {
        orchestrator
            .create_reservation_async(request.event_id, requester, request.quantity)
            .await
    })
    .await
    .map_err(|e| ReservationError::Worker(e.to_string()))??;
    Ok((StatusCode::CREATED, Json(reservation)))
}

async fn get_reservation(
    State(orchestrator): State<ReservationOrchestrator>,
    Path(id): Path<ReservationId>,
) -> WebResult<Json<ReservationResponse>> {
    Ok(Json(orchestrator.get_reservation(id).await?))
}

async fn cancel_reservation(
    State(orchestrator): State<ReservationOrchestrator>,
    CallerIdentity(requester): CallerIdentity,
    CorrelationId(correlation_id): CorrelationId,
    Path(id): Path<ReservationId>,
) -> WebResult<Json<ReservationResponse>> {
    let cancelled = with_correlation_id(
        correlation_id,
        orchestrator.cancel_reservation(id, &requester),
    )
    .await?;
    Ok(Json(cancelled))
}

async fn confirm_reservation(
    State(orchestrator): State<ReservationOrchestrator>,
    CallerIdentity(requester): CallerIdentity,
    Path(id): Path<ReservationId>,
) -> WebResult<Json<ReservationResponse>> {
    Ok(Json(orchestrator.confirm_reservation(id, &requester).await?))
}

async fn list_my_reservations(
    State(orchestrator): State<ReservationOrchestrator>,
    CallerIdentity(requester): CallerIdentity,
) -> WebResult<Json<Vec<ReservationResponse>>> {
    Ok(Json(orchestrator.find_by_requester(&requester).await?))
}

async fn list_event_reservations(
    State(orchestrator): State<ReservationOrchestrator>,
    Path(event_id): Path<EventId>,
) -> WebResult<Json<Vec<ReservationResponse>>> {
    Ok(Json(orchestrator.find_by_event(event_id).await?))
}

async fn check_availability(
    State(orchestrator): State<ReservationOrchestrator>,
    CorrelationId(correlation_id): CorrelationId,
    Query(query): Query<AvailabilityQuery>,
) -> WebResult<Json<bool>> {
    let available = with_correlation_id(
        correlation_id,
        orchestrator.check_availability(query.event_id, query.quantity),
    )
    .await?;
    Ok(Json(available))
}
