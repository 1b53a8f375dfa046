//! Application layer - the turn pipeline between HTTP and the ports.
//!
//! - `prompt` - persona instruction and history rendering
//! - `typing` - chunking and pacing for incremental delivery
//! - `chat` - the per-turn orchestration service

pub mod chat;
pub mod prompt;
pub mod typing;

pub use chat::{ChatError, ChatReply, ChatService, ResponseMode, StreamEvent};
pub use typing::TypingConfig;
