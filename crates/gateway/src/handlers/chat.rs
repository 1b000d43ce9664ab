//! Chat handler

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection},
        State,
    },
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::generic_failure;
use crate::AppState;
use ragchat_common::{
    errors::{AppError, ErrorResponse},
    metrics::RequestMetrics,
    PipelineOutcome,
};

/// Session used when the client does not name one
pub const DEFAULT_SESSION_ID: &str = "default";

/// Chat request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[validate(required, length(min = 1))]
    pub message: Option<String>,

    /// Conversation key; defaults to [`DEFAULT_SESSION_ID`]
    pub session_id: Option<String>,
}

/// Chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
}

/// Answer one message within its session
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let metrics = RequestMetrics::start("POST", "/chat");
    let response = match parse_request(&headers, body) {
        Ok(request) => respond(state, request).await,
        Err(response) => response,
    };
    metrics.finish(response.status().as_u16());
    response
}

/// Decode the body; empty or non-JSON bodies read as `{}`
fn parse_request(
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<ChatRequest, Response> {
    let body = body.map_err(|rejection| {
        tracing::error!(error = %rejection.body_text(), "Unreadable chat request body");
        generic_failure()
    })?;

    if body.is_empty() || !is_json(headers) {
        return Ok(ChatRequest::default());
    }

    match Json::<ChatRequest>::from_bytes(&body) {
        Ok(Json(request)) => Ok(request),
        Err(JsonRejection::JsonDataError(e)) => {
            Err(AppError::validation("message", e.body_text()).into_response())
        }
        Err(rejection) => {
            tracing::error!(error = %rejection.body_text(), "Malformed chat request body");
            Err(generic_failure())
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/json") || essence.ends_with("+json")
}

async fn respond(state: AppState, request: ChatRequest) -> Response {
    let message = match (request.validate(), request.message) {
        (Ok(()), Some(message)) => message,
        _ => return AppError::validation("message", "Message is required").into_response(),
    };
    let session_id = request
        .session_id
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());

    tracing::info!(session_id = %session_id, message = %message, "New chat message");

    match state.pipeline.handle(&message, &session_id).await {
        PipelineOutcome::Answered { answer } => {
            tracing::info!(session_id = %session_id, "Response sent");
            Json(ChatResponse {
                success: true,
                response: answer,
            })
            .into_response()
        }
        PipelineOutcome::Failed { stage, error } => {
            tracing::warn!(session_id = %session_id, stage = %stage, error = %error, "Chat request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new(error))).into_response()
        }
    }
}
