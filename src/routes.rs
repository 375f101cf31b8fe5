//! HTTP route handlers
//!
//! Three routes: a fixed greeting, a health check, and a long-running call
//! whose response goes through a [`ResponseTracker`].

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::sync::oneshot;

use crate::config::AppState;
use crate::middleware::{with_interceptors, HEALTH_PATH};
use crate::task::LongTask;
use crate::tracker::ResponseTracker;

/// Body of `GET /`
pub const GREETING: &str = "Hello From Version Four";

/// Body of a successful `GET /long-running`
pub const LONG_RUNNING_SUCCESS: &str = "Your 5 minutes query from the version One ran successfully";

/// Create the router with all routes and the interceptor chain
pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(greeting))
        .route(HEALTH_PATH, get(health))
        .route("/long-running", get(long_running));

    with_interceptors(routes, state.gate.clone()).with_state(state)
}

async fn greeting() -> &'static str {
    GREETING
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "OK" })))
}

async fn long_running(State(state): State<AppState>) -> Response {
    run_tracked(state.long_task.clone(), ResponseTracker::new()).await
}

/// Run `task` on its own tokio task and wait for the response it produces.
///
/// The work is not cancelled when the client goes away: dropping this future
/// only marks `tracker` closed, and the finished work then writes nothing.
pub async fn run_tracked(task: Arc<dyn LongTask>, tracker: ResponseTracker) -> Response {
    tracing::info!("Long running task started");

    let _close = tracker.close_guard();
    let (tx, rx) = oneshot::channel();

    let worker = tracker.clone();
    tokio::spawn(async move {
        let response = match task.run().await {
            Ok(()) => (StatusCode::OK, LONG_RUNNING_SUCCESS).into_response(),
            Err(e) => {
                tracing::error!("Long running task failed: {}", e);
                internal_error()
            }
        };
        worker.deliver(tx, response);
    });

    match rx.await {
        Ok(response) => response,
        Err(_) => {
            // The worker died (panicked) without handing anything over
            tracing::error!("Long running task ended without a response");
            tracker.begin_response();
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal Server Error" })),
    )
        .into_response()
}
