use crate::dtos::HealthResponse;
use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

pub const SERVICE_NAME: &str = "file-converter";

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        minio_available: state.storage.is_some(),
    })
}

/// Readiness probe: succeeds while the worker queue accepts jobs.
#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Accepting conversions"),
        (status = 503, description = "Workers are not running")
    ),
    tag = "Observability"
)]
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    if state.jobs.is_open() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
