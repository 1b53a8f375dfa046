//! In-memory session store.
//!
//! A mutex-guarded map, suitable for a single-instance deployment. Callers
//! receive cloned snapshots; all mutation goes through the store so
//! concurrent requests never interleave writes on shared turn lists.
//!
//! Expired sessions are reaped at the start of every operation rather than
//! by a background task. Under zero traffic expired entries linger, which is
//! acceptable since the map only grows with request volume.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::{Session, SessionId, SessionSummary, Turn};
use crate::ports::{SessionStore, StoreError};

/// Default idle expiry.
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Mutex-guarded in-memory implementation of the SessionStore port.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    timeout: Duration,
}

impl InMemorySessionStore {
    /// Creates a store with the default 30-minute idle expiry.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_SESSION_TIMEOUT)
    }

    /// Creates a store with a custom idle expiry.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Removes expired sessions under an already-held lock.
    fn reap_locked(&self, sessions: &mut HashMap<SessionId, Session>) -> usize {
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(self.timeout, now));
        before - sessions.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn resolve(&self, token: Option<&str>) -> (SessionId, Session) {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        self.reap_locked(&mut sessions);

        if let Some(token) = token {
            let id = SessionId::from_string(token);
            if let Some(session) = sessions.get_mut(&id) {
                session.touch();
                return (id, session.clone());
            }
        }

        let session = Session::new();
        let id = session.id.clone();
        sessions.insert(id.clone(), session.clone());
        (id, session)
    }

    async fn get(&self, id: &SessionId) -> Result<Session, StoreError> {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        self.reap_locked(&mut sessions);

        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        self.reap_locked(&mut sessions);

        sessions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list(&self) -> Vec<SessionSummary> {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        self.reap_locked(&mut sessions);

        sessions.values().map(Session::summary).collect()
    }

    async fn append_turn(&self, id: &SessionId, turn: Turn) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        self.reap_locked(&mut sessions);

        let session = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        session.push_turn(turn);
        session.touch();
        Ok(())
    }

    async fn reap_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        self.reap_locked(&mut sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MAX_RETAINED_TURNS;

    #[tokio::test]
    async fn resolve_without_token_creates_a_session() {
        let store = InMemorySessionStore::new();
        let (id, session) = store.resolve(None).await;

        assert_eq!(session.id, id);
        assert!(session.messages.is_empty());
        assert!(session.last_activity >= session.created_at);
    }

    #[tokio::test]
    async fn resolve_with_unknown_token_creates_a_session() {
        let store = InMemorySessionStore::new();
        let (id, _) = store.resolve(Some("unknown-token")).await;

        assert_ne!(id.as_str(), "unknown-token");
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn resolve_with_live_token_refreshes_activity() {
        let store = InMemorySessionStore::new();
        let (id, first) = store.resolve(None).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let (resolved_id, second) = store.resolve(Some(id.as_str())).await;

        assert_eq!(resolved_id, id);
        assert!(second.last_activity >= first.last_activity);
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn get_returns_not_found_for_unknown_id() {
        let store = InMemorySessionStore::new();
        let missing = SessionId::from_string("missing");

        let err = store.get(&missing).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        // Lookup must not create a session as a side effect.
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_the_session() {
        let store = InMemorySessionStore::new();
        let (id, _) = store.resolve(None).await;

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.is_err());

        let err = store.delete(&id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn append_turn_caps_retained_history() {
        let store = InMemorySessionStore::new();
        let (id, _) = store.resolve(None).await;

        for i in 1..=MAX_RETAINED_TURNS + 1 {
            store
                .append_turn(&id, Turn::new(format!("turn {}", i), "reply"))
                .await
                .unwrap();
        }

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.messages.len(), MAX_RETAINED_TURNS);
        assert_eq!(session.messages[0].user, "turn 2");
    }

    #[tokio::test]
    async fn append_turn_to_unknown_session_fails() {
        let store = InMemorySessionStore::new();
        let missing = SessionId::from_string("missing");

        let err = store.append_turn(&missing, Turn::new("q", "a")).await;
        assert!(matches!(err, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn expired_sessions_are_reaped_on_access() {
        let store = InMemorySessionStore::with_timeout(Duration::from_millis(10));
        let (id, _) = store.resolve(None).await;

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(store.get(&id).await.is_err());
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn live_sessions_survive_reaping() {
        let store = InMemorySessionStore::with_timeout(Duration::from_secs(60));
        let (id, _) = store.resolve(None).await;

        assert_eq!(store.reap_expired().await, 0);
        assert!(store.get(&id).await.is_ok());
    }

    #[tokio::test]
    async fn reap_expired_reports_removed_count() {
        let store = InMemorySessionStore::with_timeout(Duration::from_millis(10));
        store.resolve(None).await;
        store.resolve(None).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.reap_expired().await, 2);
    }

    #[tokio::test]
    async fn list_summarizes_live_sessions() {
        let store = InMemorySessionStore::new();
        let (id, _) = store.resolve(None).await;
        store.append_turn(&id, Turn::new("q", "a")).await.unwrap();

        let summaries = store.list().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, id);
        assert_eq!(summaries[0].message_count, 1);
    }
}
