//! HTTP handlers for the chat, session, and health endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::Utc;
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::application::{ChatError, ChatService};
use crate::domain::SessionId;
use crate::ports::SessionStore;

use super::dto::{
    ChatRequest, ChatResponse, ChatStreamRequest, DeleteResponse, ErrorResponse, HealthResponse,
    SessionListResponse, SessionResponse,
};

/// Shared state for all endpoints.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
    pub store: Arc<dyn SessionStore>,
}

// ════════════════════════════════════════════════════════════════════════════
// Chat endpoints
// ════════════════════════════════════════════════════════════════════════════

/// POST /chat - one blocking chat turn
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    match state
        .service
        .chat(&req.message, req.session_id.as_deref())
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(ChatResponse::from(reply))).into_response(),
        Err(e) => handle_chat_error(e),
    }
}

/// POST /chat/stream - one streamed chat turn as server-sent events
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(req): Json<ChatStreamRequest>,
) -> Response {
    match state
        .service
        .chat_stream(&req.message, req.session_id.as_deref(), req.image_urls())
        .await
    {
        Ok(events) => {
            let stream =
                ReceiverStream::new(events).map(|event| Event::default().json_data(&event));
            let sse = Sse::new(stream).keep_alive(KeepAlive::default());
            ([(header::CACHE_CONTROL, "no-cache")], sse).into_response()
        }
        Err(e) => handle_chat_error(e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Session endpoints
// ════════════════════════════════════════════════════════════════════════════

/// GET /sessions/:id - session details
pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = SessionId::from_string(id);
    match state.store.get(&id).await {
        Ok(session) => (StatusCode::OK, Json(SessionResponse::from(session))).into_response(),
        Err(_) => session_not_found(),
    }
}

/// DELETE /sessions/:id - remove a session
pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = SessionId::from_string(id);
    match state.store.delete(&id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(DeleteResponse {
                message: "セッションが削除されました".to_string(),
            }),
        )
            .into_response(),
        Err(_) => session_not_found(),
    }
}

/// GET /sessions - summaries of all live sessions
pub async fn list_sessions(State(state): State<AppState>) -> Response {
    let sessions = state
        .store
        .list()
        .await
        .into_iter()
        .map(Into::into)
        .collect();
    (StatusCode::OK, Json(SessionListResponse { sessions })).into_response()
}

// ════════════════════════════════════════════════════════════════════════════
// Health endpoint
// ════════════════════════════════════════════════════════════════════════════

/// GET /health - liveness probe with session count
pub async fn health(State(state): State<AppState>) -> Response {
    let active_sessions = state.store.list().await.len();
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            active_sessions,
        }),
    )
        .into_response()
}

// ════════════════════════════════════════════════════════════════════════════
// Error handling
// ════════════════════════════════════════════════════════════════════════════

fn handle_chat_error(error: ChatError) -> Response {
    let status = match &error {
        ChatError::EmptyMessage => StatusCode::BAD_REQUEST,
        ChatError::SessionNotFound => StatusCode::NOT_FOUND,
        ChatError::Completion(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match &error {
        ChatError::Completion(_) => format!("エラーが発生しました: {}", error),
        _ => error.to_string(),
    };
    (status, Json(ErrorResponse::new(message))).into_response()
}

fn session_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("セッションが見つかりません")),
    )
        .into_response()
}
