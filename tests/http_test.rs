//! Router-level tests for the HTTP surface.
//!
//! These run against the full router (routes plus interceptors) without a
//! real listener.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{test_state, CountingTask};
use drainserve::config::AppState;
use drainserve::middleware::RESTARTING_MESSAGE;
use drainserve::routes::{create_router, GREETING, LONG_RUNNING_SUCCESS};
use pretty_assertions::assert_eq;
use serde_json::json;

const SHORT: Duration = Duration::from_millis(20);

fn test_server(state: AppState) -> axum_test::TestServer {
    axum_test::TestServer::new(create_router(state)).unwrap()
}

#[tokio::test]
async fn test_greeting() {
    let server = test_server(test_state(CountingTask::succeeding(SHORT)));

    let response = server.get("/").await;

    response.assert_status_ok();
    response.assert_text(GREETING);
    assert!(response
        .header("content-type")
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn test_health_is_ok() {
    let server = test_server(test_state(CountingTask::succeeding(SHORT)));

    let response = server.get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.text(), r#"{"status":"OK"}"#);
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn test_long_running_success() {
    let task = CountingTask::succeeding(SHORT);
    let server = test_server(test_state(task.clone()));

    let response = server.get("/long-running").await;

    response.assert_status_ok();
    response.assert_text(LONG_RUNNING_SUCCESS);
    assert_eq!(task.runs(), 1);
}

#[tokio::test]
async fn test_long_running_failure_is_500() {
    let task = CountingTask::failing(SHORT);
    let server = test_server(test_state(task.clone()));

    let response = server.get("/long-running").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), r#"{"error":"Internal Server Error"}"#);
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let server = test_server(test_state(CountingTask::succeeding(SHORT)));

    server.get("/nope").await.assert_status_not_found();
}

#[tokio::test]
async fn test_every_route_rejected_while_draining() {
    let task = CountingTask::succeeding(SHORT);
    let state = test_state(task.clone());
    let gate = state.gate.clone();
    let server = test_server(state);

    gate.begin_draining();

    for path in ["/", "/health", "/long-running", "/nope"] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = response.json();
        assert_eq!(body, json!({ "message": RESTARTING_MESSAGE }));
    }

    // The long task was never started
    assert_eq!(task.runs(), 0);
}

#[tokio::test]
async fn test_repeated_begin_draining_looks_the_same() {
    let state = test_state(CountingTask::succeeding(SHORT));
    let gate = state.gate.clone();
    let server = test_server(state);

    gate.begin_draining();
    let once = server.get("/health").await;

    gate.begin_draining();
    gate.begin_draining();
    let many = server.get("/health").await;

    assert_eq!(once.status_code(), many.status_code());
    assert_eq!(once.text(), many.text());
}
