//! Notification endpoint.
//!
//! One `POST /v1/notifications` per delivery; the handler runs a full
//! controller invocation and answers with the completion report. A
//! failed invocation answers 500 so the channel's own redelivery is the
//! only retry mechanism beyond the in-invocation budget. Skipped and
//! executed invocations both answer 200 — unrelated payloads are never
//! an error.

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use bytes::Bytes;

use replicaband_controller::{InvocationOutcome, ScalingController, delivery_now};

/// Shared state for the notification handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: ScalingController,
}

/// Build the daemon router.
pub fn build_router(controller: ScalingController) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/notifications", post(notify))
        .with_state(AppState { controller })
}

async fn healthz() -> &'static str {
    "ok"
}

/// POST /v1/notifications
async fn notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let token = headers
        .get("x-delivery-token")
        .and_then(|v| v.to_str().ok());

    let report = state.controller.handle(delivery_now(&body, token)).await;

    let status = match report.outcome {
        InvocationOutcome::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };
    (status, axum::Json(report))
}
