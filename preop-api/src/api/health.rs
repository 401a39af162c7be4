//! Health endpoint (no auth)

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "preop-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
