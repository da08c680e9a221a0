use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use super::router::router;
use crate::core::config::{AppPaths, AppSettings};
use crate::core::security::{SessionToken, API_KEY_HEADER};
use crate::state::AppState;

const TOKEN: &str = "test-token";

struct TestApp {
    _dir: TempDir,
    app: Router,
}

async fn test_app(variation: &str, expired: bool) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let paths = Arc::new(AppPaths::with_data_dir(dir.path()));
    let mut settings = AppSettings::from_config(&json!({}));
    settings.study.variation_override = Some(variation.to_string());
    settings.study.expired_override = Some(expired);
    // nothing listens here; fetches fail fast
    settings.sync.endpoint_override = Some("http://127.0.0.1:9/latest.json".to_string());

    let state = AppState::build(paths, settings, SessionToken::new(TOKEN))
        .await
        .unwrap();
    TestApp {
        _dir: dir,
        app: router(state),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header(API_KEY_HEADER, token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn event(kind: &str, ms: u32) -> Value {
    json!({
        "type": kind,
        "timestamp": format!("2026-10-19T14:00:00.{:03}Z", ms),
        "awesomeBarState": { "searchString": "", "searchStringLength": 0, "suggestions": [] }
    })
}

#[tokio::test]
async fn health_and_status() {
    let test = test_app("model1", false).await;

    let (status, body) = send(&test.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&test.app, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["study"]["status"], "active");
    assert_eq!(body["study"]["variation"]["name"], "model1");
    assert_eq!(body["model"]["version"], -1);
}

#[tokio::test]
async fn events_require_api_key() {
    let test = test_app("model1", false).await;

    let (status, _) = send(&test.app, post_json("/api/events", event("focus", 0), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &test.app,
        post_json("/api/events", event("focus", 0), Some("wrong")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_results_session_trains_once() {
    let test = test_app("model2", false).await;

    let (status, body) = send(
        &test.app,
        post_json("/api/events", event("focus", 0), Some(TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "disposition": "recorded" }));

    let (status, body) = send(
        &test.app,
        post_json("/api/events", event("blur", 500), Some(TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["disposition"], "model_updated");
    assert_eq!(body["loss"], 0.0);
}

#[tokio::test]
async fn private_browsing_drops_events() {
    let test = test_app("model1", false).await;

    let (status, body) = send(
        &test.app,
        post_json("/api/privacy", json!({ "private_window_open": true }), Some(TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["private_browsing_active"], true);

    let (_, body) = send(
        &test.app,
        post_json("/api/events", event("focus", 0), Some(TOKEN)),
    )
    .await;
    assert_eq!(body["disposition"], "dropped_private");

    let (_, body) = send(&test.app, get("/api/privacy")).await;
    assert_eq!(body["permanent_private_browsing"], false);
}

#[tokio::test]
async fn model_endpoints() {
    let test = test_app("model3-submitting", false).await;

    let (status, body) = send(&test.app, get("/api/model")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["branch"]["model_number"], 3);
    assert_eq!(body["weights"]["places.frecency.typedVisitBonus"], 2000);

    let (status, _) = send(&test.app, post_json("/api/model/sync", json!({}), Some(TOKEN))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn control_branch_cannot_sync() {
    let test = test_app("control", false).await;
    let (status, _) = send(&test.app, post_json("/api/model/sync", json!({}), Some(TOKEN))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn permanent_private_browsing_ends_study_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let paths = Arc::new(AppPaths::with_data_dir(dir.path()));
    let mut settings = AppSettings::from_config(&json!({}));
    settings.permanent_private_browsing = true;

    let state = AppState::build(paths, settings, SessionToken::new(TOKEN))
        .await
        .unwrap();
    assert!(state.runtime.is_none());
    let app = router(state);

    let (_, body) = send(&app, get("/api/status")).await;
    assert_eq!(body["study"]["status"], "ended");
    assert_eq!(body["study"]["ending"], "ineligible");
    assert_eq!(body["study"]["urls"], json!([]));
}

#[tokio::test]
async fn ended_study_rejects_events() {
    let test = test_app("model1", true).await;

    let (_, body) = send(&test.app, get("/api/status")).await;
    assert_eq!(body["study"]["status"], "ended");
    assert_eq!(body["study"]["ending"], "expired");

    let (status, _) = send(
        &test.app,
        post_json("/api/events", event("focus", 0), Some(TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
