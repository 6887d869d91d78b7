//! The orchestrator against a real Inventory Authority, in-process and over HTTP.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use boxoffice_core::{
    EventId, InventoryClient, InventoryStore, LockKey, LockManager, PrincipalId,
    ReservationError, ReservationStatus,
};
use boxoffice_inventory::InventoryAuthority;
use boxoffice_reservation::{Config, HttpInventoryClient, ReservationOrchestrator, build_router};
use boxoffice_runtime::{InMemoryInventoryStore, InMemoryReservationStore, LocalLockManager};
use boxoffice_testing::{FlakyReservationStore, fixtures, init_test_tracing, test_clock};
use boxoffice_web::{CORRELATION_ID_HEADER, USER_HEADER};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn authority_with(seats: u64) -> (Arc<InventoryAuthority>, EventId) {
    let (authority, event_id, _) = authority_with_locks(seats).await;
    (authority, event_id)
}

async fn authority_with_locks(
    seats: u64,
) -> (Arc<InventoryAuthority>, EventId, Arc<LocalLockManager>) {
    init_test_tracing();
    let store = Arc::new(InMemoryInventoryStore::new());
    let event = fixtures::event(seats);
    store.save(&event).await.unwrap();
    let locks = Arc::new(LocalLockManager::new());
    let authority = InventoryAuthority::new(store, locks.clone());
    (Arc::new(authority), event.id, locks)
}

/// Client built from the reservation service's default configuration.
fn default_client(base_url: String) -> HttpInventoryClient {
    let config = Config::from_lookup(&|_: &str| -> Option<String> { None }).unwrap();
    HttpInventoryClient::new(base_url, config.inventory.request_timeout()).unwrap()
}

fn requester() -> PrincipalId {
    PrincipalId::new(fixtures::REQUESTER)
}

async fn remaining(authority: &InventoryAuthority, id: EventId) -> u64 {
    authority.get_event(id).await.unwrap().remaining_seats()
}

/// Serve the inventory router on an ephemeral port and return its base URL.
async fn serve_inventory(authority: Arc<InventoryAuthority>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = boxoffice_inventory::build_router(authority, None);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_reserve_then_cancel_restores_inventory() {
    let (authority, event_id) = authority_with(100).await;
    let orchestrator = ReservationOrchestrator::new(
        authority.clone(),
        Arc::new(InMemoryReservationStore::new()),
        Arc::new(test_clock()),
    );

    let created = orchestrator
        .create_reservation(event_id, requester(), 30)
        .await
        .unwrap();
    assert_eq!(remaining(&authority, event_id).await, 70);

    let err = orchestrator
        .create_reservation(event_id, requester(), 80)
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::InsufficientInventory { .. }));
    assert_eq!(remaining(&authority, event_id).await, 70);

    let cancelled = orchestrator
        .cancel_reservation(created.id, &requester())
        .await
        .unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(remaining(&authority, event_id).await, 100);
}

#[tokio::test]
async fn test_failed_save_rolls_seats_back() {
    let (authority, event_id) = authority_with(20).await;
    let store = Arc::new(FlakyReservationStore::new());
    let orchestrator =
        ReservationOrchestrator::new(authority.clone(), store.clone(), Arc::new(test_clock()));
    store.fail_saves(true);

    let err = orchestrator
        .create_reservation(event_id, requester(), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::Store(_)));
    assert_eq!(remaining(&authority, event_id).await, 20);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let (authority, _) = authority_with(5).await;
    let orchestrator = ReservationOrchestrator::new(
        authority,
        Arc::new(InMemoryReservationStore::new()),
        Arc::new(test_clock()),
    );
    let unknown = EventId::new();

    let err = orchestrator
        .create_reservation(unknown, requester(), 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReservationError::Inventory(boxoffice_core::ClientError::NotFound(id)) if id == unknown
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_saga_over_http() {
    let (authority, event_id) = authority_with(10).await;
    let base_url = serve_inventory(authority.clone()).await;
    let client = Arc::new(default_client(base_url));

    assert!(client.check_availability(event_id, 10).await.unwrap());
    assert_eq!(client.get_inventory(event_id).await.unwrap().remaining_seats(), 10);

    let store = Arc::new(FlakyReservationStore::new());
    let orchestrator = ReservationOrchestrator::new(client, store.clone(), Arc::new(test_clock()));

    let created = orchestrator
        .create_reservation_async(event_id, requester(), 6)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(remaining(&authority, event_id).await, 4);

    let err = orchestrator
        .create_reservation(event_id, requester(), 5)
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::InsufficientInventory { .. }));

    store.fail_next_saves(1);
    let err = orchestrator
        .create_reservation(event_id, requester(), 4)
        .await
        .unwrap_err();
    assert!(matches!(err, ReservationError::Store(_)));
    assert_eq!(remaining(&authority, event_id).await, 4);

    orchestrator
        .cancel_reservation(created.id, &requester())
        .await
        .unwrap();
    assert_eq!(remaining(&authority, event_id).await, 10);

    let err = orchestrator.check_availability(event_id, 0).await.unwrap_err();
    assert!(matches!(err, ReservationError::InvalidArgument(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sagas_never_oversell() {
    let (authority, event_id) = authority_with(25).await;
    let base_url = serve_inventory(authority.clone()).await;
    let client = Arc::new(HttpInventoryClient::new(base_url, Duration::from_secs(10)).unwrap());
    let orchestrator = ReservationOrchestrator::new(
        client,
        Arc::new(InMemoryReservationStore::new()),
        Arc::new(test_clock()),
    );

    let handles: Vec<_> = (0..40)
        .map(|i| {
            orchestrator.create_reservation_async(
                event_id,
                PrincipalId::new(format!("user{i}@x.com")),
                1,
            )
        })
        .collect();

    let mut booked: u64 = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            booked += 1;
        }
    }

    assert!(booked <= 25);
    assert_eq!(remaining(&authority, event_id).await, 25 - booked);
    assert_eq!(orchestrator.find_by_event(event_id).await.unwrap().len(), usize::try_from(booked).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_default_timeout_outlasts_lock_wait() {
    let (authority, event_id, locks) = authority_with_locks(10).await;
    let base_url = serve_inventory(authority.clone()).await;
    let store = Arc::new(InMemoryReservationStore::new());
    let orchestrator = ReservationOrchestrator::new(
        Arc::new(default_client(base_url)),
        store,
        Arc::new(test_clock()),
    );
    let key = LockKey::for_event(event_id);

    // Held for 4s: the authority is still waiting when the holder lets go.
    let held = locks
        .acquire(&key, Duration::ZERO, Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();
    let holder = {
        let locks = locks.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            locks.release(&held).await.unwrap();
        })
    };
    let created = orchestrator
        .create_reservation(event_id, requester(), 2)
        .await
        .unwrap();
    holder.await.unwrap();
    assert_eq!(created.quantity, 2);
    assert_eq!(remaining(&authority, event_id).await, 8);

    // Held past the authority's wait: declined, nothing taken, nothing recorded.
    let _held = locks
        .acquire(&key, Duration::ZERO, Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();
    let err = orchestrator
        .create_reservation(event_id, requester(), 2)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ReservationError::InsufficientInventory { .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(remaining(&authority, event_id).await, 8);
    assert_eq!(orchestrator.find_by_event(event_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_correlation_id_reaches_inventory() {
    let inventory = MockServer::start().await;
    let event_id = EventId::new();
    let correlation_id = Uuid::new_v4();
    Mock::given(method("PUT"))
        .and(path(format!("/events/{event_id}/reserve")))
        .and(header(CORRELATION_ID_HEADER, correlation_id.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .expect(1)
        .mount(&inventory)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/events/{event_id}/rollback")))
        .and(header(CORRELATION_ID_HEADER, correlation_id.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .expect(1)
        .mount(&inventory)
        .await;

    let orchestrator = ReservationOrchestrator::new(
        Arc::new(default_client(inventory.uri())),
        Arc::new(InMemoryReservationStore::new()),
        Arc::new(test_clock()),
    );
    let router = build_router(orchestrator, None);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/reservations")
                .header(USER_HEADER, fixtures::REQUESTER)
                .header(CORRELATION_ID_HEADER, correlation_id.to_string())
                .header("content-type", "application/json")
                .body(Body::from(json!({ "event_id": event_id, "quantity": 2 }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let created: boxoffice_reservation::ReservationResponse =
        serde_json::from_slice(&bytes).unwrap();

    let response = router
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/reservations/{}", created.id))
                .header(USER_HEADER, fixtures::REQUESTER)
                .header(CORRELATION_ID_HEADER, correlation_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
