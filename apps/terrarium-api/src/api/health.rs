//! Readiness endpoint

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct ReadinessResponse {
    status: &'static str,
    mongodb: bool,
    response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(readiness_check))
        .with_state(state)
}

/// Ready once MongoDB answers a ping; 503 otherwise.
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let health = database::mongodb::check_health_detailed(&state.mongo_client).await;

    let status = if health.healthy {
        StatusCode::OK
    } else {
        tracing::warn!(message = ?health.message, "MongoDB readiness check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            status: if health.healthy { "ready" } else { "unhealthy" },
            mongodb: health.healthy,
            response_time_ms: health.response_time_ms,
            message: health.message,
        }),
    )
}
