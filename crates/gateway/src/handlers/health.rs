//! Health check handler

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub endpoint: String,
}

/// Liveness probe - always returns OK if the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        message: "Chat API is running".to_string(),
        endpoint: "POST /chat".to_string(),
    })
}
