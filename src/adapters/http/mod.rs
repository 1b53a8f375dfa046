//! HTTP adapter - the REST/SSE surface of the chat backend.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::app_router;
