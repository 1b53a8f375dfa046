//! OpenAI-compatible completion client.
//!
//! Implements the CompletionClient port against the chat-completions API.
//! Streaming responses arrive as Server-Sent Events; each `data:` payload is
//! parsed and its content delta yielded as a text fragment until the
//! `[DONE]` marker.
//!
//! # Configuration
//!
//! ```ignore
//! let config = OpenAiConfig::new(api_key)
//!     .with_base_url("https://api.openai.com/v1")
//!     .with_text_model("gpt-4o-mini")
//!     .with_vision_model("gpt-4o");
//!
//! let client = OpenAiClient::new(config);
//! ```
//!
//! Requests carrying image URLs are routed to the vision model with a
//! text+image content-part array; text-only requests use the faster text
//! model.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::AiConfig;
use crate::ports::{CompletionClient, CompletionError, CompletionRequest, FragmentStream};

/// Configuration for the OpenAI-compatible client.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Base URL for the API.
    pub base_url: String,
    /// Model for text-only requests.
    pub text_model: String,
    /// Model for requests with image content.
    pub vision_model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap for streaming requests.
    pub max_completion_tokens: u32,
    /// Request timeout.
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            base_url: "https://api.openai.com/v1".to_string(),
            text_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o".to_string(),
            temperature: 1.0,
            max_completion_tokens: 1000,
            timeout: Duration::from_secs(60),
        }
    }

    /// Builds a configuration from the application's provider settings.
    pub fn from_app_config(config: &AiConfig) -> Self {
        Self {
            api_key: Secret::new(config.openai_api_key.clone().unwrap_or_default()),
            base_url: config.openai_api_base.clone(),
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
            temperature: config.temperature,
            max_completion_tokens: config.max_completion_tokens,
            timeout: config.timeout(),
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the text-only model.
    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    /// Sets the vision model.
    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Exposes the API key (for making requests).
    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// OpenAI-compatible API client.
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Probes the credential by listing models.
    ///
    /// Called once at startup; a failure here means the service should run
    /// in mock mode instead.
    pub async fn verify_credentials(&self) -> Result<usize, CompletionError> {
        let response = self
            .client
            .get(format!("{}/models", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .send()
            .await
            .map_err(|e| CompletionError::network(e.to_string()))?;

        let response = handle_response_status(response).await?;
        let listing: ModelListing = response
            .json()
            .await
            .map_err(|e| CompletionError::parse(format!("Failed to parse model listing: {}", e)))?;

        Ok(listing.data.len())
    }

    /// Picks the model for a request: vision-capable when images are
    /// attached, the faster text model otherwise.
    fn model_for(&self, request: &CompletionRequest) -> &str {
        if request.has_images() {
            &self.config.vision_model
        } else {
            &self.config.text_model
        }
    }

    /// Converts a port request to the provider's wire format.
    fn to_wire_request(&self, request: &CompletionRequest, stream: bool) -> WireRequest {
        let user_content = if request.has_images() {
            let mut parts = Vec::new();
            if !request.user_message.is_empty() {
                parts.push(ContentPart::Text {
                    text: request.user_message.clone(),
                });
            }
            for url in &request.image_urls {
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl { url: url.clone() },
                });
            }
            UserContent::Parts(parts)
        } else {
            UserContent::Text(request.user_message.clone())
        };

        WireRequest {
            model: self.model_for(request).to_string(),
            messages: vec![
                WireMessage {
                    role: "system".to_string(),
                    content: serde_json::Value::String(request.system_prompt.clone()),
                },
                WireMessage {
                    role: "user".to_string(),
                    content: serde_json::to_value(user_content)
                        .unwrap_or(serde_json::Value::Null),
                },
            ],
            temperature: self.config.temperature,
            stream: if stream { Some(true) } else { None },
            max_completion_tokens: if stream {
                Some(self.config.max_completion_tokens)
            } else {
                None
            },
        }
    }

    async fn send_request(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<Response, CompletionError> {
        let wire_request = self.to_wire_request(request, stream);

        self.client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .header("Content-Type", "application/json")
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    CompletionError::network(format!("Connection failed: {}", e))
                } else {
                    CompletionError::network(e.to_string())
                }
            })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let response = self.send_request(&request, false).await?;
        let response = handle_response_status(response).await?;

        let wire_response: WireResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::parse(format!("Failed to parse response: {}", e)))?;

        wire_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::parse("No completion choices in response"))
    }

    async fn stream_complete(
        &self,
        request: CompletionRequest,
    ) -> Result<FragmentStream, CompletionError> {
        let response = self.send_request(&request, true).await?;
        let response = handle_response_status(response).await?;

        let fragments = response
            .bytes_stream()
            .map(|chunk_result| match chunk_result {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    parse_sse_fragments(&text)
                }
                Err(e) => vec![Err(CompletionError::network(format!("Stream error: {}", e)))],
            })
            .flat_map(stream::iter);

        Ok(Box::pin(fragments))
    }
}

/// Maps a non-success response to the port's error taxonomy.
async fn handle_response_status(response: Response) -> Result<Response, CompletionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();

    // Quota exhaustion is recoverable and must stay distinguishable from
    // ordinary rate limiting or auth failures.
    if error_body.contains("insufficient_quota") {
        return Err(CompletionError::QuotaExceeded);
    }

    match status.as_u16() {
        401 => Err(CompletionError::AuthenticationFailed),
        400 => Err(CompletionError::InvalidRequest(error_body)),
        500..=599 => Err(CompletionError::unavailable(format!(
            "Server error {}: {}",
            status, error_body
        ))),
        _ => Err(CompletionError::network(format!(
            "Unexpected status {}: {}",
            status, error_body
        ))),
    }
}

/// Parses SSE `data:` lines into text fragments.
fn parse_sse_fragments(text: &str) -> Vec<Result<String, CompletionError>> {
    let mut fragments = Vec::new();

    for line in text.lines() {
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };

        if data == "[DONE]" {
            continue;
        }

        match serde_json::from_str::<WireStreamChunk>(data) {
            Ok(chunk) => {
                if let Some(choice) = chunk.choices.first() {
                    if let Some(ref content) = choice.delta.content {
                        if !content.is_empty() {
                            fragments.push(Ok(content.clone()));
                        }
                    }
                }
            }
            Err(e) => {
                if !data.trim().is_empty() {
                    fragments.push(Err(CompletionError::parse(format!(
                        "Failed to parse SSE chunk: {}",
                        e
                    ))));
                }
            }
        }
    }

    fragments
}

// ----- Wire types -----

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum UserContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireStreamDelta,
}

#[derive(Debug, Deserialize)]
struct WireStreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelListing {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[allow(dead_code)]
    id: String,
}
