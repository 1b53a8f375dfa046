//! Completion provider configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Placeholder key values that count as "no key configured".
///
/// These show up in checked-in env templates and must never reach the
/// provider as a Bearer token.
const PLACEHOLDER_KEYS: &[&str] = &["test-key", "your-openai-api-key-here"];

/// Completion provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Force canned responses regardless of credentials
    #[serde(default)]
    pub mock_mode: bool,

    /// Provider API key
    pub openai_api_key: Option<String>,

    /// Provider endpoint override
    #[serde(default = "default_api_base")]
    pub openai_api_base: String,

    /// Model for text-only turns
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Model for turns carrying image attachments
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap for streaming requests
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl AiConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check whether a usable API key is configured
    pub fn has_api_key(&self) -> bool {
        self.openai_api_key
            .as_ref()
            .is_some_and(|k| !k.is_empty() && !PLACEHOLDER_KEYS.contains(&k.as_str()))
    }

    /// Whether the service must run on canned responses.
    ///
    /// True when the mock flag is set or when no usable key is configured.
    /// A startup credential probe may still force mock mode afterwards.
    pub fn is_mock(&self) -> bool {
        self.mock_mode || !self.has_api_key()
    }

    /// Validate provider configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.openai_api_base.starts_with("http://")
            && !self.openai_api_base.starts_with("https://")
        {
            return Err(ValidationError::InvalidProviderUrl);
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            mock_mode: false,
            openai_api_key: None,
            openai_api_base: default_api_base(),
            text_model: default_text_model(),
            vision_model: default_vision_model(),
            temperature: default_temperature(),
            max_completion_tokens: default_max_completion_tokens(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_text_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    1.0
}

fn default_max_completion_tokens() -> u32 {
    1000
}

fn default_timeout() -> u64 {
    60
}
