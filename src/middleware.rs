//! Request/response interceptors wrapped around every route.
//!
//! The chain, outermost first:
//! 1. [`reject_when_draining`] answers 503 once the gate is set; nothing
//!    behind it runs.
//! 2. [`log_unhealthy_health`] logs `/health` responses that are not 200.

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;

use crate::gate::RequestGate;

/// Message returned to clients while the server drains
pub const RESTARTING_MESSAGE: &str = "Server is restarting, please retry shortly";

/// Path whose failures get logged
pub const HEALTH_PATH: &str = "/health";

/// Wrap `router` (routes and fallback) in the interceptor chain.
pub fn with_interceptors<S>(router: Router<S>, gate: RequestGate) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // Layers added last run first.
    router
        .layer(middleware::from_fn(log_unhealthy_health))
        .layer(middleware::from_fn_with_state(gate, reject_when_draining))
}

/// Turn away every request once draining has begun.
pub async fn reject_when_draining(
    State(gate): State<RequestGate>,
    request: Request,
    next: Next,
) -> Response {
    if gate.is_draining() {
        tracing::debug!(
            "Rejecting {} {} while draining",
            request.method(),
            request.uri().path()
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": RESTARTING_MESSAGE })),
        )
            .into_response();
    }

    next.run(request).await
}

/// Log status and body of any non-200 `/health` response, then pass it on
/// unchanged.
pub async fn log_unhealthy_health(request: Request, next: Next) -> Response {
    if request.uri().path() != HEALTH_PATH {
        return next.run(request).await;
    }

    let response = next.run(request).await;
    if response.status() == StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                status = parts.status.as_u16(),
                "Health check issue, body unreadable: {}",
                e
            );
            return Response::from_parts(parts, Body::empty());
        }
    };

    tracing::warn!(
        status = parts.status.as_u16(),
        body = %String::from_utf8_lossy(&bytes),
        "Health check issue"
    );

    Response::from_parts(parts, Body::from(bytes))
}
