//! Router assembly for the chat backend.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    chat, chat_stream, delete_session, get_session, health, list_sessions, AppState,
};

/// Creates the application router with all endpoints and shared layers.
///
/// CORS is permissive so browser clients on other origins can reach the
/// streaming endpoint.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
