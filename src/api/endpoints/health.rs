//! Liveness check.

use axum::Json;

use crate::api::types::HealthResponse;

/// `GET /health`
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
    })
}
