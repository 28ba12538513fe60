use axum::{Json, Router, extract::State, routing::get};
use core_config::AppInfo;
use serde::Serialize;

/// Liveness payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

async fn health_handler(State(app): State<AppInfo>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        name: app.name,
        version: app.version,
    })
}

/// `GET /health`, answering 200 while the process is up.
///
/// Readiness (storage reachability) is app-specific and mounted by the binary.
pub fn health_router(app_info: AppInfo) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(app_info)
}
