//! Health check handlers

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub engine: &'static str,
}

/// Liveness probe - always returns ok if server is running
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: factcheck_common::VERSION,
        engine: factcheck_common::ENGINE_NAME,
    })
}
