//! HTTP DTOs for the chat and session endpoints.
//!
//! These types decouple the wire format from domain types. Timestamps are
//! serialized as RFC 3339 strings.

use serde::{Deserialize, Serialize};

use crate::application::ChatReply;
use crate::domain::{Session, SessionSummary, Turn};

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Request body for the blocking chat endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Request body for the streaming chat endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatStreamRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
}

/// One attached image reference.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageAttachment {
    #[serde(default)]
    pub url: Option<String>,
}

impl ChatStreamRequest {
    /// Non-empty attachment URLs, in order.
    pub fn image_urls(&self) -> Vec<String> {
        self.images
            .iter()
            .filter_map(|image| image.url.clone())
            .filter(|url| !url.is_empty())
            .collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Response for a blocking chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub structured_analysis: String,
    pub timestamp: String,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            response: reply.response,
            session_id: reply.session_id.to_string(),
            structured_analysis: reply.structured_analysis,
            timestamp: reply.timestamp.to_rfc3339(),
        }
    }
}

/// One persisted turn in a session view.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub user: String,
    pub assistant: String,
    pub structured_analysis: String,
    pub timestamp: String,
}

impl From<Turn> for TurnResponse {
    fn from(turn: Turn) -> Self {
        Self {
            user: turn.user,
            assistant: turn.assistant,
            structured_analysis: turn.structured_analysis,
            timestamp: turn.timestamp.to_rfc3339(),
        }
    }
}

/// Detailed session view.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<TurnResponse>,
    pub created_at: String,
    pub last_activity: String,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id.to_string(),
            messages: session.messages.into_iter().map(Into::into).collect(),
            created_at: session.created_at.to_rfc3339(),
            last_activity: session.last_activity.to_rfc3339(),
        }
    }
}

/// Session summary for the list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummaryResponse {
    pub session_id: String,
    pub created_at: String,
    pub last_activity: String,
    pub message_count: usize,
}

impl From<SessionSummary> for SessionSummaryResponse {
    fn from(summary: SessionSummary) -> Self {
        Self {
            session_id: summary.id.to_string(),
            created_at: summary.created_at.to_rfc3339(),
            last_activity: summary.last_activity.to_rfc3339(),
            message_count: summary.message_count,
        }
    }
}

/// List of live sessions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummaryResponse>,
}

/// Confirmation for a session deletion.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// Health probe response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub active_sessions: usize,
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionId;
    use chrono::Utc;

    #[test]
    fn chat_request_deserializes_without_session_id() {
        let json = r#"{"message": "テスト"}"#;
        let request: ChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.message, "テスト");
        assert!(request.session_id.is_none());
    }

    #[test]
    fn stream_request_defaults_images_to_empty() {
        let json = r#"{"message": "hello", "session_id": "abc"}"#;
        let request: ChatStreamRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.session_id.as_deref(), Some("abc"));
        assert!(request.image_urls().is_empty());
    }

    #[test]
    fn stream_request_filters_blank_image_urls() {
        let json = r#"{
            "message": "what is this?",
            "images": [
                {"url": "https://example.com/a.png"},
                {"url": ""},
                {}
            ]
        }"#;
        let request: ChatStreamRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.image_urls(), vec!["https://example.com/a.png"]);
    }

    #[test]
    fn chat_response_converts_from_reply() {
        let reply = ChatReply {
            response: "応答".to_string(),
            session_id: SessionId::from_string("token"),
            structured_analysis: String::new(),
            timestamp: Utc::now(),
        };

        let response: ChatResponse = reply.into();
        assert_eq!(response.response, "応答");
        assert_eq!(response.session_id, "token");
        assert!(response.timestamp.contains('T'));
    }

    #[test]
    fn session_response_carries_turns() {
        let mut session = Session::new();
        session.push_turn(Turn::new("質問", "回答"));

        let response: SessionResponse = session.into();
        assert_eq!(response.messages.len(), 1);
        assert_eq!(response.messages[0].user, "質問");
        assert_eq!(response.messages[0].assistant, "回答");
    }

    #[test]
    fn error_response_serializes_single_field() {
        let json = serde_json::to_string(&ErrorResponse::new("メッセージが空です")).unwrap();
        assert_eq!(json, r#"{"error":"メッセージが空です"}"#);
    }
}
