//! API handlers module

pub mod chat;
pub mod health;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ragchat_common::errors::{ErrorResponse, GENERIC_FAILURE_MESSAGE};
use std::any::Any;

/// Returned for any path or method without a handler
pub async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(
            "Endpoint not found. Use POST /chat to send messages.",
        )),
    )
}

/// Converts a handler panic into the generic 500 envelope
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %detail, "Handler panicked");

    generic_failure()
}

/// `500 { success: false, error: "Something went wrong!" }`
pub fn generic_failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(GENERIC_FAILURE_MESSAGE)),
    )
        .into_response()
}
