// libs/reservation-cell/tests/router_test.rs

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use reservation_cell::*;
use shared_utils::test_utils::{hours_after_epoch, test_clock, TestServices};
use shared_utils::ManualClock;
use slot_cell::{SlotChange, SlotDraft, SlotEventPublisher, SlotStore};

fn setup_router() -> (Router, Uuid, ManualClock) {
    let clock = test_clock();
    let store = Arc::new(SlotStore::new(Arc::new(clock.clone()), SlotEventPublisher::new(16)));
    let slot_id = Uuid::new_v4();
    store
        .apply_update(
            slot_id,
            1,
            SlotChange::Create(SlotDraft {
                facility_id: 2077485,
                service: TestServices::cardiology(),
                start_time: hours_after_epoch(24),
                duration_minutes: 30,
                capacity: 1,
            }),
        )
        .unwrap();

    let coordinator = Arc::new(ReservationCoordinator::new(store, HoldPolicy::default()));
    (reservation_routes(ReservationCellState { coordinator }), slot_id, clock)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_hold_and_confirm_endpoints() {
    let (app, slot_id, _) = setup_router();

    let (status, hold) = send(
        app.clone(),
        post_json(
            "/",
            json!({ "slot_id": slot_id, "requester_id": "citizen-1", "ttl_seconds": 120 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(hold["requester_id"], "citizen-1");

    let (status, _) = send(
        app.clone(),
        post_json("/", json!({ "slot_id": slot_id, "requester_id": "citizen-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, confirmed) = send(
        app,
        post_json(&format!("/{}/confirm", slot_id), json!({ "requester_id": "citizen-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["slot"]["status"], "booked");
    assert_eq!(confirmed["booking"]["slot_id"], slot_id.to_string());
}

#[tokio::test]
async fn test_expired_confirm_is_gone() {
    let (app, slot_id, clock) = setup_router();
    send(
        app.clone(),
        post_json(
            "/",
            json!({ "slot_id": slot_id, "requester_id": "citizen-1", "ttl_seconds": 60 }),
        ),
    )
    .await;

    clock.advance(Duration::minutes(2));
    let (status, json) = send(
        app,
        post_json(&format!("/{}/confirm", slot_id), json!({ "requester_id": "citizen-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
    assert!(json["error"].as_str().unwrap().contains("Expired"));
}

#[tokio::test]
async fn test_release_endpoint_and_bad_ttl() {
    let (app, slot_id, _) = setup_router();

    let (status, _) = send(
        app.clone(),
        post_json(
            "/",
            json!({ "slot_id": slot_id, "requester_id": "citizen-1", "ttl_seconds": 999999999 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(
        app.clone(),
        post_json("/", json!({ "slot_id": slot_id, "requester_id": "citizen-1" })),
    )
    .await;
    let (status, json) = send(
        app.clone(),
        post_json(&format!("/{}/release", slot_id), json!({ "requester_id": "citizen-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["slot"]["status"], "open");

    let (status, _) = send(
        app,
        post_json(&format!("/{}/release", Uuid::new_v4()), json!({ "requester_id": "citizen-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
