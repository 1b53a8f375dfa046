//! Completion client adapters.
//!
//! Implementations of the CompletionClient port:
//!
//! - `OpenAiClient` - OpenAI-compatible chat-completions API
//! - `MockCompletionClient` - canned persona replies for credential-less
//!   operation

mod mock;
mod openai;

pub use mock::MockCompletionClient;
pub use openai::{OpenAiClient, OpenAiConfig};
