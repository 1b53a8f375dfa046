//! Session and turn value objects.
//!
//! A session is the server-side record of one user's ongoing conversation:
//! an opaque identifier, an ordered list of turns, and activity timestamps.
//! Sessions are short-lived: idle entries expire after a fixed timeout and
//! only the most recent turns are retained.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Maximum number of turns retained per session. Older turns are dropped
/// oldest-first when the cap is exceeded.
pub const MAX_RETAINED_TURNS: usize = 20;

/// Opaque unique token identifying a session.
///
/// Generated as a UUID v4 string but treated as an opaque token everywhere:
/// any client-supplied string that doesn't name a live session simply
/// resolves to a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new random SessionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps a client-supplied token without validation.
    pub fn from_string(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One user message paired with the assistant's reply.
///
/// Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Raw user input text (trimmed by the caller).
    pub user: String,
    /// Full generated reply, assembled even when delivered incrementally.
    pub assistant: String,
    /// Optional annotation; empty on normal paths.
    pub structured_analysis: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Creates a turn with an empty analysis annotation.
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self::with_analysis(user, assistant, "")
    }

    /// Creates a turn carrying an analysis annotation.
    pub fn with_analysis(
        user: impl Into<String>,
        assistant: impl Into<String>,
        structured_analysis: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
            structured_analysis: structured_analysis.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Server-side conversation state for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Ordered turns, oldest first, capped at [`MAX_RETAINED_TURNS`].
    pub messages: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every access; never decreases.
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session with fresh timestamps.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Refreshes the activity timestamp.
    ///
    /// `last_activity` never moves backwards, even if the clock does.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Appends a turn, evicting the oldest beyond the retention cap.
    pub fn push_turn(&mut self, turn: Turn) {
        self.messages.push(turn);
        if self.messages.len() > MAX_RETAINED_TURNS {
            let excess = self.messages.len() - MAX_RETAINED_TURNS;
            self.messages.drain(..excess);
        }
    }

    /// Whether the session has been idle longer than `timeout` as of `now`.
    pub fn is_expired(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(timeout) {
            Ok(timeout) => now - self.last_activity > timeout,
            Err(_) => false,
        }
    }

    /// Projects the session into its list-endpoint summary.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            message_count: self.messages.len(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a live session for the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
}
