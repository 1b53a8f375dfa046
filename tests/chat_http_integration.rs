//! Integration tests for the chat HTTP surface.
//!
//! These tests wire the full stack through the public crate API:
//! 1. Router, handlers, and DTOs over the real in-memory store
//! 2. The canned-reply client for mock-mode turns
//! 3. Scripted completion clients for the provider failure paths

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use futures::stream;
use serde_json::{json, Value};
use tower::ServiceExt;

use banso_chat::adapters::ai::MockCompletionClient;
use banso_chat::adapters::http::{app_router, AppState};
use banso_chat::adapters::store::InMemorySessionStore;
use banso_chat::application::{ChatService, ResponseMode, TypingConfig};
use banso_chat::ports::{CompletionClient, CompletionError, CompletionRequest, FragmentStream};

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Completion client whose calls always report quota exhaustion.
struct QuotaExhaustedClient;

#[async_trait]
impl CompletionClient for QuotaExhaustedClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
        Err(CompletionError::QuotaExceeded)
    }

    async fn stream_complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<FragmentStream, CompletionError> {
        Err(CompletionError::QuotaExceeded)
    }
}

/// Completion client that streams a fixed reply in small fragments.
struct FragmentedClient {
    reply: String,
}

#[async_trait]
impl CompletionClient for FragmentedClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
        Ok(self.reply.clone())
    }

    async fn stream_complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<FragmentStream, CompletionError> {
        let fragments: Vec<Result<String, CompletionError>> = self
            .reply
            .chars()
            .collect::<Vec<char>>()
            .chunks(3)
            .map(|c| Ok(c.iter().collect()))
            .collect();
        Ok(Box::pin(stream::iter(fragments)))
    }
}

fn router_with(
    client: Arc<dyn CompletionClient>,
    mode: ResponseMode,
    session_timeout: Duration,
) -> Router {
    let store = Arc::new(InMemorySessionStore::with_timeout(session_timeout));
    let service = ChatService::new(store.clone(), client, mode)
        .with_typing(TypingConfig::instant());

    app_router(AppState {
        service: Arc::new(service),
        store,
    })
}

fn mock_router() -> Router {
    router_with(
        Arc::new(MockCompletionClient::new()),
        ResponseMode::Mock,
        Duration::from_secs(1800),
    )
}

async fn post_json(router: &Router, uri: &str, body: Value) -> axum::http::Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn send(router: &Router, method: Method, uri: &str) -> axum::http::Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Parses an SSE body into its `data:` payloads.
async fn sse_events(response: axum::http::Response<Body>) -> Vec<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    text.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn chat_turn_round_trips_through_the_session_api() {
    let router = mock_router();

    let response = post_json(&router, "/chat", json!({"message": "テスト"})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(!body["response"].as_str().unwrap().is_empty());
    assert!(!body["timestamp"].as_str().unwrap().is_empty());
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let response = send(&router, Method::GET, &format!("/sessions/{}", session_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["user"], "テスト");

    let response = send(&router, Method::DELETE, &format!("/sessions/{}", session_id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&router, Method::GET, &format!("/sessions/{}", session_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mock_streaming_emits_content_then_a_single_complete() {
    let router = mock_router();

    let response = post_json(&router, "/chat/stream", json!({"message": "テスト"})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let events = sse_events(response).await;
    assert!(events.len() >= 2);
    assert!(!events.iter().any(|e| e["type"] == "error"));

    let (last, content_events) = events.split_last().unwrap();
    assert_eq!(last["type"], "complete");
    assert!(content_events.iter().all(|e| e["type"] == "content"));
}

#[tokio::test]
async fn live_streaming_reconstructs_the_provider_reply() {
    let reply = "分割して届く長めの応答です、順序どおりに再構成されるはずです。".repeat(4);
    let router = router_with(
        Arc::new(FragmentedClient {
            reply: reply.clone(),
        }),
        ResponseMode::Live,
        Duration::from_secs(1800),
    );

    let response = post_json(&router, "/chat/stream", json!({"message": "質問"})).await;
    let events = sse_events(response).await;

    let streamed: String = events
        .iter()
        .filter(|e| e["type"] == "content")
        .map(|e| e["content"].as_str().unwrap())
        .collect();
    assert_eq!(streamed, reply);

    let last = events.last().unwrap();
    assert_eq!(last["type"], "complete");

    // The assembled reply was persisted, not the fragments.
    let session_id = last["session_id"].as_str().unwrap();
    let response = send(&router, Method::GET, &format!("/sessions/{}", session_id)).await;
    let body = body_json(response).await;
    assert_eq!(body["messages"][0]["assistant"].as_str().unwrap(), reply);
}

#[tokio::test]
async fn quota_exhaustion_streams_the_apology_and_completes() {
    let router = router_with(
        Arc::new(QuotaExhaustedClient),
        ResponseMode::Live,
        Duration::from_secs(1800),
    );

    let response = post_json(&router, "/chat/stream", json!({"message": "KPIの立て方"})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let events = sse_events(response).await;
    assert!(!events.iter().any(|e| e["type"] == "error"));
    assert_eq!(events.last().unwrap()["type"], "complete");

    let streamed: String = events
        .iter()
        .filter(|e| e["type"] == "content")
        .map(|e| e["content"].as_str().unwrap())
        .collect();
    assert!(streamed.contains("利用制限"));
    assert!(streamed.contains("「KPIの立て方」"));

    let session_id = events.last().unwrap()["session_id"].as_str().unwrap();
    let response = send(&router, Method::GET, &format!("/sessions/{}", session_id)).await;
    let body = body_json(response).await;
    let turn = &body["messages"][0];
    assert!(turn["assistant"].as_str().unwrap().contains("利用制限"));
    assert!(!turn["structured_analysis"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn idle_sessions_expire_between_requests() {
    let router = router_with(
        Arc::new(MockCompletionClient::new()),
        ResponseMode::Mock,
        Duration::from_millis(20),
    );

    let response = post_json(&router, "/chat", json!({"message": "こんにちは"})).await;
    let body = body_json(response).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = send(&router, Method::GET, &format!("/sessions/{}", session_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&router, Method::GET, "/sessions").await;
    let body = body_json(response).await;
    assert!(body["sessions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn provider_failure_on_the_blocking_path_returns_a_server_error() {
    struct FailingClient;

    #[async_trait]
    impl CompletionClient for FailingClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
            Err(CompletionError::unavailable("backend down"))
        }

        async fn stream_complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<FragmentStream, CompletionError> {
            Err(CompletionError::unavailable("backend down"))
        }
    }

    let router = router_with(
        Arc::new(FailingClient),
        ResponseMode::Live,
        Duration::from_secs(1800),
    );

    let response = post_json(&router, "/chat", json!({"message": "質問"})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("エラーが発生しました"));
}
