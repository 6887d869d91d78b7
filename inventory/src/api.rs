//! HTTP binding for the Inventory Authority.
//!
//! - `POST   /events` create (caller becomes owner) → 201
//! - `GET    /events` list all
//! - `GET    /events/mine` list the caller's events
//! - `GET    /events/:id` get
//! - `PUT    /events/:id` full replace (owner only)
//! - `DELETE /events/:id` delete (owner only) → 204
//! - `GET    /events/:id/availability?quantity=` → `bool`
//! - `PUT    /events/:id/reserve?quantity=` → `bool`
//! - `PUT    /events/:id/rollback?quantity=` → `bool`
//!
//! The caller is identified by the `X-User` header.

use crate::authority::InventoryAuthority;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use boxoffice_core::{EventDraft, EventId, EventInventory, SeatQuantity};
use boxoffice_web::{AppError, CallerIdentity, WebResult, correlation_id_layer, observability_routes};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Event as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    /// Event ID
    pub id: EventId,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// When the event takes place
    pub starts_at: DateTime<Utc>,
    /// Publisher
    pub owner: String,
    /// Seats still available
    pub remaining_seats: u64,
}

impl From<EventInventory> for EventResponse {
    fn from(event: EventInventory) -> Self {
        Self {
            id: event.id,
            remaining_seats: event.remaining_seats(),
            title: event.title,
            description: event.description,
            starts_at: event.starts_at,
            owner: event.owner.to_string(),
        }
    }
}

/// `?quantity=` on the seat endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QuantityQuery {
    /// Requested seats; must be positive
    pub quantity: i64,
}

/// Build the inventory service router, including `/health` and `/metrics`.
pub fn build_router(authority: Arc<InventoryAuthority>, metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/mine", get(list_my_events))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/:id/availability", get(check_availability))
        .route("/events/:id/reserve", put(reserve_seats))
        .route("/events/:id/rollback", put(rollback_seats))
        .with_state(authority)
        .merge(observability_routes(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}

async fn create_event(
    State(authority): State<Arc<InventoryAuthority>>,
    CallerIdentity(owner): CallerIdentity,
    Json(draft): Json<EventDraft>,
) -> WebResult<(StatusCode, Json<EventResponse>)> {
    let event = authority.create_event(owner, draft).await?;
    Ok((StatusCode::CREATED, Json(event.into())))
}

async fn list_events(
    State(authority): State<Arc<InventoryAuthority>>,
) -> WebResult<Json<Vec<EventResponse>>> {
    let events = authority.list_events().await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

async fn list_my_events(
    State(authority): State<Arc<InventoryAuthority>>,
    CallerIdentity(owner): CallerIdentity,
) -> WebResult<Json<Vec<EventResponse>>> {
    let events = authority.list_events_by_owner(&owner).await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

async fn get_event(
    State(authority): State<Arc<InventoryAuthority>>,
    Path(id): Path<EventId>,
) -> WebResult<Json<EventResponse>> {
    Ok(Json(authority.get_event(id).await?.into()))
}

async fn update_event(
    State(authority): State<Arc<InventoryAuthority>>,
    CallerIdentity(owner): CallerIdentity,
    Path(id): Path<EventId>,
    Json(draft): Json<EventDraft>,
) -> WebResult<Json<EventResponse>> {
    Ok(Json(authority.update_event(id, &owner, draft).await?.into()))
}

async fn delete_event(
    State(authority): State<Arc<InventoryAuthority>>,
    CallerIdentity(owner): CallerIdentity,
    Path(id): Path<EventId>,
) -> WebResult<StatusCode> {
    authority.delete_event(id, &owner).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn check_availability(
    State(authority): State<Arc<InventoryAuthority>>,
    Path(id): Path<EventId>,
    Query(query): Query<QuantityQuery>,
) -> WebResult<Json<bool>> {
    Ok(Json(authority.check_availability(id, query.quantity).await?))
}

async fn reserve_seats(
    State(authority): State<Arc<InventoryAuthority>>,
    Path(id): Path<EventId>,
    Query(query): Query<QuantityQuery>,
) -> WebResult<Json<bool>> {
    let quantity = parse_quantity(query)?;
    Ok(Json(authority.reserve_seats(id, quantity).await?))
}

async fn rollback_seats(
    State(authority): State<Arc<InventoryAuthority>>,
    Path(id): Path<EventId>,
    Query(query): Query<QuantityQuery>,
) -> WebResult<Json<bool>> {
    let quantity = parse_quantity(query)?;
    Ok(Json(authority.rollback_reserve_seats(id, quantity).await?))
}

fn parse_quantity(query: QuantityQuery) -> Result<SeatQuantity, AppError> {
    SeatQuantity::new(query.quantity)
        .map_err(|e| AppError::bad_request(e.to_string()).with_code("INVALID_ARGUMENT"))
}
