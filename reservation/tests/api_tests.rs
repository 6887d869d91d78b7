//! HTTP binding tests against a scripted inventory.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
};
use boxoffice_core::{ClientError, EventId, ReservationStatus};
use boxoffice_reservation::{ReservationOrchestrator, ReservationResponse, build_router};
use boxoffice_testing::{FlakyReservationStore, ScriptedInventoryClient, fixtures, test_clock};
use boxoffice_web::USER_HEADER;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

struct App {
    router: Router,
    inventory: Arc<ScriptedInventoryClient>,
    store: Arc<FlakyReservationStore>,
}

fn app() -> App {
    let inventory = Arc::new(ScriptedInventoryClient::new());
    let store = Arc::new(FlakyReservationStore::new());
    let orchestrator =
        ReservationOrchestrator::new(inventory.clone(), store.clone(), Arc::new(test_clock()));
    App {
        router: build_router(orchestrator, None),
        inventory,
        store,
    }
}

fn request(method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create(app: &App, event_id: EventId, quantity: i64, user: &str) -> Response {
    app.router
        .clone()
        .oneshot(request(
            Method::POST,
            "/reservations",
            Some(user),
            Some(json!({ "event_id": event_id, "quantity": quantity })),
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_then_get_reservation() {
    let app = app();
    let event_id = EventId::new();

    let response = create(&app, event_id, 10, fixtures::REQUESTER).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: ReservationResponse = json_body(response).await;
    assert_eq!(created.event_id, event_id);
    assert_eq!(created.quantity, 10);
    assert_eq!(created.requester, fixtures::REQUESTER);
    assert_eq!(created.status, ReservationStatus::Confirmed);

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, &format!("/reservations/{}", created.id), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body::<ReservationResponse>(response).await, created);
}

#[tokio::test]
async fn test_create_requires_identity() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/reservations",
            None,
            Some(json!({ "event_id": EventId::new(), "quantity": 1 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.inventory.calls().is_empty());
}

#[tokio::test]
async fn test_create_error_statuses() {
    let app = app();

    let response = create(&app, EventId::new(), 0, fixtures::REQUESTER).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.inventory.calls().is_empty());

    app.inventory.queue_reserve(Ok(false));
    let response = create(&app, EventId::new(), 5, fixtures::REQUESTER).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = json_body(response).await;
    assert_eq!(body["code"], "INSUFFICIENT_INVENTORY");

    let missing = EventId::new();
    app.inventory.queue_reserve(Err(ClientError::NotFound(missing)));
    let response = create(&app, missing, 5, fixtures::REQUESTER).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.inventory
        .queue_reserve(Err(ClientError::Transport("connection refused".to_string())));
    let response = create(&app, EventId::new(), 5, fixtures::REQUESTER).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_failed_save_is_server_error_and_compensated() {
    let app = app();
    let event_id = EventId::new();
    app.store.fail_next_saves(1);

    let response = create(&app, event_id, 4, fixtures::REQUESTER).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.inventory.rollback_calls().len(), 1);
    assert_eq!(app.inventory.rollback_calls()[0].0, event_id);
}

#[tokio::test]
async fn test_cancel_flow() {
    let app = app();
    let created: ReservationResponse =
        json_body(create(&app, EventId::new(), 3, fixtures::REQUESTER).await).await;
    let uri = format!("/reservations/{}", created.id);

    let response = app
        .router
        .clone()
        .oneshot(request(Method::DELETE, &uri, Some("b@x.com"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .clone()
        .oneshot(request(Method::DELETE, &uri, Some(fixtures::REQUESTER), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled: ReservationResponse = json_body(response).await;
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    let response = app
        .router
        .clone()
        .oneshot(request(Method::DELETE, &uri, Some(fixtures::REQUESTER), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = json_body(response).await;
    assert_eq!(body["code"], "ALREADY_CANCELLED");
    assert_eq!(app.inventory.rollback_calls().len(), 1);
}

#[tokio::test]
async fn test_declined_cancel_keeps_status() {
    let app = app();
    let created: ReservationResponse =
        json_body(create(&app, EventId::new(), 3, fixtures::REQUESTER).await).await;
    app.inventory.answer_rollback(Ok(false));

    let uri = format!("/reservations/{}", created.id);
    let response = app
        .router
        .clone()
        .oneshot(request(Method::DELETE, &uri, Some(fixtures::REQUESTER), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = json_body(response).await;
    assert_eq!(body["code"], "COMPENSATION_FAILED");

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, &uri, None, None))
        .await
        .unwrap();
    let current: ReservationResponse = json_body(response).await;
    assert_eq!(current.status, ReservationStatus::Confirmed);
}

#[tokio::test]
async fn test_confirm_endpoint() {
    let inventory = Arc::new(ScriptedInventoryClient::new());
    let orchestrator = ReservationOrchestrator::new(
        inventory,
        Arc::new(FlakyReservationStore::new()),
        Arc::new(test_clock()),
    )
    .with_workflow(boxoffice_core::ReservationWorkflow::HoldThenConfirm);
    let router = build_router(orchestrator, None);

    let response = router
        .clone()
        .oneshot(request(
            Method::POST,
            "/reservations",
            Some(fixtures::REQUESTER),
            Some(json!({ "event_id": EventId::new(), "quantity": 2 })),
        ))
        .await
        .unwrap();
    let created: ReservationResponse = json_body(response).await;
    assert_eq!(created.status, ReservationStatus::Pending);

    let uri = format!("/reservations/{}/confirm", created.id);
    let response = router
        .clone()
        .oneshot(request(Method::POST, &uri, Some("b@x.com"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(request(Method::POST, &uri, Some(fixtures::REQUESTER), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let confirmed: ReservationResponse = json_body(response).await;
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);
}

#[tokio::test]
async fn test_list_by_user_and_event() {
    let app = app();
    let first = EventId::new();
    let second = EventId::new();
    create(&app, first, 1, fixtures::REQUESTER).await;
    create(&app, second, 2, fixtures::REQUESTER).await;
    create(&app, first, 3, "b@x.com").await;

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/reservations/user", Some(fixtures::REQUESTER), None))
        .await
        .unwrap();
    let mine: Vec<ReservationResponse> = json_body(response).await;
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|r| r.requester == fixtures::REQUESTER));

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, &format!("/reservations/event/{first}"), None, None))
        .await
        .unwrap();
    let for_event: Vec<ReservationResponse> = json_body(response).await;
    assert_eq!(for_event.len(), 2);
    assert!(for_event.iter().all(|r| r.event_id == first));

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/reservations/event/{}", EventId::new()),
            None,
            None,
        ))
        .await
        .unwrap();
    let none: Vec<ReservationResponse> = json_body(response).await;
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_availability_passthrough() {
    let app = app();
    let event_id = EventId::new();
    app.inventory.answer_availability(Ok(false));

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/reservations/availability?event_id={event_id}&quantity=5"),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!json_body::<bool>(response).await);

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/reservations/availability?event_id={event_id}&quantity=-1"),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.inventory.calls().len(), 1);
}

#[tokio::test]
async fn test_unknown_reservation_is_not_found() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/reservations/{}", boxoffice_core::ReservationId::new()),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .router
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
