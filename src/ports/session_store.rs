//! Session Store Port - Interface for conversation state storage.
//!
//! The store exclusively owns all session and turn data; callers receive
//! cloned snapshots. Expired sessions are reaped as a side effect of every
//! operation, never by a background timer, so the store stays bounded as
//! long as requests keep arriving.

use async_trait::async_trait;

use crate::domain::{Session, SessionId, SessionSummary, Turn};

/// Port for session state storage.
///
/// Implementations must synchronize concurrent access explicitly; handlers
/// share one store across requests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the live session named by `token`, refreshing its activity
    /// timestamp, or allocates a fresh session when the token is absent or
    /// names no live session.
    async fn resolve(&self, token: Option<&str>) -> (SessionId, Session);

    /// Returns a snapshot of the session, or `NotFound`.
    async fn get(&self, id: &SessionId) -> Result<Session, StoreError>;

    /// Removes the session if present.
    async fn delete(&self, id: &SessionId) -> Result<(), StoreError>;

    /// Summaries of all live sessions.
    async fn list(&self) -> Vec<SessionSummary>;

    /// Appends a turn to the session, evicting the oldest beyond the
    /// retention cap.
    async fn append_turn(&self, id: &SessionId, turn: Turn) -> Result<(), StoreError>;

    /// Removes every session idle longer than the timeout. Returns the
    /// number removed.
    async fn reap_expired(&self) -> usize;
}

/// Session store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No live session with the given id.
    #[error("session not found: {0}")]
    NotFound(SessionId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_the_token() {
        let id = SessionId::from_string("missing-token");
        let err = StoreError::NotFound(id);
        assert_eq!(err.to_string(), "session not found: missing-token");
    }
}
