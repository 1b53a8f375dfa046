//! Completion Client Port - Interface for the LLM provider integration.
//!
//! Abstracts the upstream completion provider: given a composed system
//! prompt and the user's content, return either a full text completion or an
//! incremental stream of text fragments. Adapters translate between this
//! contract and the provider's wire API.
//!
//! Quota exhaustion is modeled as an explicit error variant rather than
//! being folded into a generic failure, because callers recover from it
//! differently (canned fallback) than from everything else (surfaced error).

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Incremental text fragments from a streaming completion.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// Port for LLM completion requests.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a single completion (non-streaming).
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;

    /// Generate a streaming completion.
    ///
    /// Returns fragments in generation order; concatenating them yields the
    /// full reply text.
    async fn stream_complete(
        &self,
        request: CompletionRequest,
    ) -> Result<FragmentStream, CompletionError>;
}

/// Request for a completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Composed system prompt (persona + rendered history).
    pub system_prompt: String,
    /// Raw user message.
    pub user_message: String,
    /// Image URLs attached to the message, if any.
    pub image_urls: Vec<String>,
}

impl CompletionRequest {
    /// Creates a text-only request.
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            image_urls: Vec::new(),
        }
    }

    /// Attaches image URLs.
    pub fn with_images(mut self, image_urls: Vec<String>) -> Self {
        self.image_urls = image_urls;
        self
    }

    /// Whether this request carries image content.
    pub fn has_images(&self) -> bool {
        !self.image_urls.is_empty()
    }
}

/// Completion provider errors.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The provider reported that the usage allowance is exhausted.
    ///
    /// Recoverable: callers substitute a canned response for the affected
    /// request without changing global mode.
    #[error("provider quota exhausted")]
    QuotaExceeded,

    /// API key or authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Provider is unavailable.
    #[error("provider unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Network error during request.
    #[error("network error: {0}")]
    Network(String),

    /// Failed to parse provider response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid request configuration.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl CompletionError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true if this request can be served from the canned fallback.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, CompletionError::QuotaExceeded)
    }
}
