//! Integration tests for the HTTP API.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. This validates handler logic and routing
//! without needing a live network connection.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Utc};
use derby_core::clock::{Clock, ManualClock};
use derby_core::sampler::FixedSampler;
use derby_core::{BroadcastHub, Controller, CycleSettings};
use derby_observer::router::build_router;
use derby_observer::state::AppState;
use derby_types::VisitorId;
use futures::StreamExt;
use serde_json::{Value, json};
use tower::ServiceExt;

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T12:00:30Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn make_controller() -> Arc<Controller> {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
    let controller = Controller::new(
        CycleSettings::default(),
        clock,
        Box::new(FixedSampler(5)),
        BroadcastHub::new(16),
    )
    .unwrap();
    Arc::new(controller)
}

fn app(controller: &Arc<Controller>, allow_force_start: bool) -> Router {
    build_router(Arc::new(AppState::new(
        Arc::clone(controller),
        allow_force_start,
    )))
}

fn join_request(visitor: Option<&str>, name: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/join")
        .header("content-type", "application/json");
    if let Some(v) = visitor {
        builder = builder.header("cookie", format!("visitor_id={v}"));
    }
    builder
        .body(Body::from(json!({ "name": name }).to_string()))
        .unwrap()
}

fn get(uri: &str, visitor: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(v) = visitor {
        builder = builder.header("x-visitor-id", v);
    }
    builder.body(Body::empty()).unwrap()
}

fn force_start_request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/force-start")
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =========================================================================
// POST /api/join
// =========================================================================

#[tokio::test]
async fn join_returns_receipt() {
    let controller = make_controller();
    let response = app(&controller, false)
        .oneshot(join_request(Some("v1"), "  Ann "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "Ann");
    assert_eq!(json["start_time"], "2024-05-01T12:01:00Z");
}

#[tokio::test]
async fn join_without_visitor_is_bad_request() {
    let controller = make_controller();
    let response = app(&controller, false)
        .oneshot(join_request(None, "Ann"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "missing_visitor");
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn join_with_blank_name_is_bad_request() {
    let controller = make_controller();
    let response = app(&controller, false)
        .oneshot(join_request(Some("v1"), "   "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "invalid_name");
}

#[tokio::test]
async fn duplicate_name_conflicts() {
    let controller = make_controller();
    let router = app(&controller, false);
    let first = router
        .clone()
        .oneshot(join_request(Some("v1"), "Ann"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .oneshot(join_request(Some("v2"), "ANN"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["code"], "duplicate_name");
}

#[tokio::test]
async fn second_join_by_same_visitor_conflicts() {
    let controller = make_controller();
    let router = app(&controller, false);
    router
        .clone()
        .oneshot(join_request(Some("v1"), "Ann"))
        .await
        .unwrap();

    let second = router
        .oneshot(join_request(Some("v1"), "Bob"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["code"], "already_joined");
}

#[tokio::test]
async fn join_while_running_conflicts() {
    let controller = make_controller();
    controller.join("Ann", &VisitorId::from("v1")).await.unwrap();
    controller.force_start().await.unwrap();

    let response = app(&controller, false)
        .oneshot(join_request(Some("v2"), "Bob"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "race_in_progress");
}

// =========================================================================
// POST /api/force-start
// =========================================================================

#[tokio::test]
async fn force_start_is_forbidden_by_default() {
    let controller = make_controller();
    let response = app(&controller, false)
        .oneshot(force_start_request())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "force_start_disabled");
}

#[tokio::test]
async fn force_start_when_enabled_starts_race() {
    let controller = make_controller();
    controller.join("Ann", &VisitorId::from("v1")).await.unwrap();
    controller.join("Bob", &VisitorId::from("v2")).await.unwrap();
    let router = app(&controller, true);

    let response = router.clone().oneshot(force_start_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["participants"], json!(["Ann", "Bob"]));

    let again = router.oneshot(force_start_request()).await.unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(again).await["code"], "race_in_progress");
}

// =========================================================================
// GET /api/state and /api/lobby
// =========================================================================

#[tokio::test]
async fn state_reports_open_lobby() {
    let controller = make_controller();
    controller.join("bob", &VisitorId::from("v1")).await.unwrap();
    controller.join("Ann", &VisitorId::from("v2")).await.unwrap();

    let response = app(&controller, false)
        .oneshot(get("/api/state", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["phase"], "open");
    assert_eq!(json["members"], json!(["Ann", "bob"]));
    assert_eq!(json["start_time"], "2024-05-01T12:01:00Z");
}

#[tokio::test]
async fn state_reports_running_race() {
    let controller = make_controller();
    controller.join("Ann", &VisitorId::from("v1")).await.unwrap();
    controller.force_start().await.unwrap();

    let response = app(&controller, false)
        .oneshot(get("/api/state", None))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["phase"], "running");
    assert_eq!(json["participants"], json!(["Ann"]));
    assert_eq!(json["tick"], 0);
}

#[tokio::test]
async fn lobby_reports_own_join() {
    let controller = make_controller();
    controller.join("Ann", &VisitorId::from("v1")).await.unwrap();
    let router = app(&controller, false);

    let mine = body_json(
        router
            .clone()
            .oneshot(get("/api/lobby", Some("v1")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(mine["you_joined"], true);
    assert_eq!(mine["members"], json!(["Ann"]));

    let theirs = body_json(router.oneshot(get("/api/lobby", Some("v2"))).await.unwrap()).await;
    assert_eq!(theirs["you_joined"], false);
}

#[tokio::test]
async fn lobby_while_running_conflicts() {
    let controller = make_controller();
    controller.join("Ann", &VisitorId::from("v1")).await.unwrap();
    controller.force_start().await.unwrap();

    let response = app(&controller, false)
        .oneshot(get("/api/lobby", Some("v1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// =========================================================================
// GET /events
// =========================================================================

#[tokio::test]
async fn event_stream_opens_with_lobby_snapshot() {
    let controller = make_controller();
    controller.join("Ann", &VisitorId::from("v1")).await.unwrap();

    let response = app(&controller, false)
        .oneshot(get("/events", Some("v1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");

    let mut body = response.into_body().into_data_stream();
    let frame = body.next().await.unwrap().unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: lobby-update"), "{text}");
    assert!(text.contains("\"you_joined\":true"), "{text}");
    assert_eq!(controller.hub().observer_count(), 1);

    drop(body);
    assert_eq!(controller.hub().observer_count(), 0);
}

#[tokio::test]
async fn event_stream_carries_later_announcements() {
    let controller = make_controller();
    let response = app(&controller, false)
        .oneshot(get("/events", None))
        .await
        .unwrap();
    let mut body = response.into_body().into_data_stream();
    let _snapshot = body.next().await.unwrap().unwrap();

    controller.join("Ann", &VisitorId::from("v1")).await.unwrap();
    let frame = body.next().await.unwrap().unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: lobby-update"), "{text}");
    assert!(text.contains("\"members\":[\"Ann\"]"), "{text}");
    assert!(text.contains("\"you_joined\":false"), "{text}");
}
