//! Error types for RagChat services
//!
//! Provides a single error enum for the chat pipeline and its providers with:
//! - Distinct variants per failure source (validation, upstream, internal)
//! - HTTP status code mapping
//! - The `{ success: false, error }` response envelope
//! - Error codes for log correlation

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Message returned to clients when something unexpected escapes a handler
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong!";

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // External service errors (8xxx)
    EmbeddingError,
    VectorIndexError,
    CompletionError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::EmbeddingError => 8002,
            ErrorCode::VectorIndexError => 8003,
            ErrorCode::CompletionError => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Upstream provider errors
    #[error("Embedding service error: {message}")]
    Embedding { message: String },

    #[error("Vector index error: {message}")]
    VectorIndex { message: String },

    #[error("Completion service error: {message}")]
    Completion { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Shorthand for a validation failure on a single field
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Embedding { .. } => ErrorCode::EmbeddingError,
            AppError::VectorIndex { .. } => ErrorCode::VectorIndexError,
            AppError::Completion { .. } => ErrorCode::CompletionError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// Upstream failures surface as 500 rather than 502: clients of the chat
    /// endpoint only distinguish bad input from everything else.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            AppError::Embedding { .. }
            | AppError::VectorIndex { .. }
            | AppError::Completion { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures raised by an embedding, index or completion provider
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::Embedding { .. }
                | AppError::VectorIndex { .. }
                | AppError::Completion { .. }
        )
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Response envelope shared by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
