//! Integration tests for the chat HTTP surface.
//!
//! Runs the router against offline providers so answers are deterministic.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use ragchat_common::chat::FALLBACK_ANSWER;
use ragchat_common::completion::ExtractiveCompletion;
use ragchat_common::embeddings::HashEmbedder;
use ragchat_common::errors::{AppError, Result};
use ragchat_common::vector::{InMemoryIndex, VectorRecord};
use ragchat_common::{ChatPipeline, CompletionProvider, Embedder, SessionStore, Turn, VectorIndex};
use ragchat_gateway::{create_router, AppState};
use std::sync::Arc;
use tower::ServiceExt;

const DIM: usize = 128;

async fn make_state(completion: Arc<dyn CompletionProvider>) -> AppState {
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let index = Arc::new(InMemoryIndex::new());
    let values = embedder.embed("A stack follows LIFO order.").await.unwrap();
    index
        .upsert(vec![VectorRecord::with_text("dsa-0", values, "A stack follows LIFO order.")])
        .await
        .unwrap();

    let pipeline = ChatPipeline::new(
        Arc::new(SessionStore::new(40)),
        completion,
        embedder,
        index,
        10,
        12_000,
    );
    AppState {
        pipeline: Arc::new(pipeline),
    }
}

fn post_raw(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    post_raw(uri, &serde_json::to_string(&body).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let app = create_router(state);
    let resp = ServiceExt::<Request<Body>>::oneshot(app, request).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

struct Unavailable;

#[async_trait]
impl CompletionProvider for Unavailable {
    async fn generate(&self, _: &[Turn], _: &str) -> Result<String> {
        Err(AppError::Completion {
            message: "quota exceeded".into(),
        })
    }

    fn model_name(&self) -> &str {
        "unavailable"
    }
}

// --- /health ---

#[tokio::test]
async fn test_health_reports_ok() {
    let state = make_state(Arc::new(ExtractiveCompletion::new())).await;
    let (status, json) = send(state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "OK");
    assert_eq!(json["message"], "Chat API is running");
    assert_eq!(json["endpoint"], "POST /chat");
}

// --- /chat ---

#[tokio::test]
async fn test_chat_answers_then_falls_back() {
    let state = make_state(Arc::new(ExtractiveCompletion::new())).await;

    let (status, json) = send(
        state.clone(),
        post_json("/chat", serde_json::json!({ "message": "What order does a stack use?", "sessionId": "s1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json["response"].as_str().unwrap().contains("LIFO"));

    let (status, json) = send(
        state.clone(),
        post_json("/chat", serde_json::json!({ "message": "What about a queue?", "sessionId": "s1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["response"], FALLBACK_ANSWER);

    assert_eq!(state.pipeline.sessions().get("s1").await.len(), 4);
}

#[tokio::test]
async fn test_chat_defaults_session_id() {
    let state = make_state(Arc::new(ExtractiveCompletion::new())).await;
    let (status, _) = send(
        state.clone(),
        post_json("/chat", serde_json::json!({ "message": "What order does a stack use?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.pipeline.sessions().get("default").await.len(), 2);
}

#[tokio::test]
async fn test_chat_requires_message() {
    let state = make_state(Arc::new(ExtractiveCompletion::new())).await;

    let (status, json) = send(state.clone(), post_json("/chat", serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Message is required");

    let (status, json) = send(
        state.clone(),
        post_json("/chat", serde_json::json!({ "message": "", "sessionId": "s" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Message is required");

    assert_eq!(state.pipeline.sessions().session_count(), 0);
}

#[tokio::test]
async fn test_chat_without_json_body_requires_message() {
    let state = make_state(Arc::new(ExtractiveCompletion::new())).await;

    let bare = Request::builder()
        .method("POST")
        .uri("/chat")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(state.clone(), bare).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Message is required");

    let form = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("{\"message\":\"hi\"}"))
        .unwrap();
    let (status, json) = send(state.clone(), form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Message is required");

    let (status, json) = send(state.clone(), post_raw("/chat", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Message is required");

    assert_eq!(state.pipeline.sessions().session_count(), 0);
}

#[tokio::test]
async fn test_chat_malformed_body_is_generic_failure() {
    let state = make_state(Arc::new(ExtractiveCompletion::new())).await;
    let (status, json) = send(state, post_raw("/chat", "{not json")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Something went wrong!");
}

#[tokio::test]
async fn test_chat_provider_failure_is_reported() {
    let state = make_state(Arc::new(Unavailable)).await;
    let (status, json) = send(
        state.clone(),
        post_json("/chat", serde_json::json!({ "message": "What is a stack?", "sessionId": "s" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("quota exceeded"));
    assert!(state.pipeline.sessions().get("s").await.is_empty());
}

#[tokio::test]
async fn test_concurrent_requests_on_one_session() {
    let state = make_state(Arc::new(ExtractiveCompletion::new())).await;

    let requests = (0..8).map(|_| {
        send(
            state.clone(),
            post_json("/chat", serde_json::json!({ "message": "What order does a stack use?", "sessionId": "busy" })),
        )
    });
    for (status, _) in futures::future::join_all(requests).await {
        assert_eq!(status, StatusCode::OK);
    }

    let history = state.pipeline.sessions().get("busy").await;
    assert_eq!(history.len(), 16);
    for pair in history.chunks(2) {
        assert_eq!(pair[0], Turn::user("What order does a stack use?"));
        assert_eq!(pair[1].role, ragchat_common::Role::Model);
    }
}

// --- fallbacks ---

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let state = make_state(Arc::new(ExtractiveCompletion::new())).await;
    let (status, json) = send(state, get("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Endpoint not found. Use POST /chat to send messages.");
}

#[tokio::test]
async fn test_wrong_method_is_not_found() {
    let state = make_state(Arc::new(ExtractiveCompletion::new())).await;
    let (status, json) = send(state, get("/chat")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Endpoint not found. Use POST /chat to send messages.");
}
