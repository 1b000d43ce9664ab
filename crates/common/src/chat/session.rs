//! Session Store - In-memory conversation history
//!
//! Provides:
//! - Lazily created, keyed turn logs
//! - Per-session async locking (one request per session at a time)
//! - Exchange-level commits that keep user/model alternation
//! - Sliding-window history bound

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Speaker of a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

type History = Vec<Turn>;

/// Keyed conversation log shared by all requests
///
/// Each session owns its own `tokio::sync::Mutex`, so requests for one
/// session are linearised while other sessions proceed independently. The
/// map guard is only held long enough to clone the session's `Arc`.
pub struct SessionStore {
    sessions: DashMap<String, Arc<Mutex<History>>>,
    max_turns: usize,
}

impl SessionStore {
    /// Create a store keeping at most `max_turns` turns per session (0 = unbounded)
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            // Odd windows would split an exchange
            max_turns: max_turns - max_turns % 2,
        }
    }

    /// Snapshot of a session's history; empty for unknown sessions
    pub async fn get(&self, session_id: &str) -> Vec<Turn> {
        let session = self.sessions.get(session_id).map(|s| Arc::clone(s.value()));
        match session {
            Some(history) => history.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// Append one turn, creating the session on first use
    pub async fn append(&self, session_id: &str, turn: Turn) {
        let mut guard = self.lock(session_id).await;
        guard.push(turn);
    }

    /// Take exclusive access to a session for the duration of a request
    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        let history = Arc::clone(&self.sessions.entry(session_id.to_string()).or_default());
        SessionGuard {
            session_id: session_id.to_string(),
            history: history.lock_owned().await,
            max_turns: self.max_turns,
        }
    }

    /// Number of sessions created so far
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Exclusive handle on one session's history
pub struct SessionGuard {
    session_id: String,
    history: OwnedMutexGuard<History>,
    max_turns: usize,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Persisted turns, oldest first
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Record a full question/answer exchange in one step
    pub fn commit_exchange(&mut self, question: Turn, answer: Turn) {
        self.history.push(question);
        self.history.push(answer);
        self.trim();
    }

    fn push(&mut self, turn: Turn) {
        self.history.push(turn);
        self.trim();
    }

    fn trim(&mut self) {
        if self.max_turns == 0 || self.history.len() <= self.max_turns {
            return;
        }
        let mut excess = self.history.len() - self.max_turns;
        // Drop whole exchanges so the window still opens with a user turn
        excess += excess % 2;
        let len = self.history.len();
        self.history.drain(..excess.min(len));
        tracing::debug!(
            session_id = %self.session_id,
            dropped = excess,
            kept = self.history.len(),
            "Session history trimmed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let store = SessionStore::default();
        assert!(store.get("missing").await.is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_append_creates_session_in_order() {
        let store = SessionStore::default();
        store.append("s1", Turn::user("q1")).await;
        store.append("s1", Turn::model("a1")).await;

        assert_eq!(store.get("s1").await, vec![Turn::user("q1"), Turn::model("a1")]);
        assert_eq!(store.session_count(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::default();
        store.append("a", Turn::user("only in a")).await;

        assert!(store.get("b").await.is_empty());
        assert_eq!(store.get("a").await.len(), 1);
    }

    #[tokio::test]
    async fn test_window_drops_whole_exchanges() {
        let store = SessionStore::new(4);
        for i in 0..3 {
            let mut guard = store.lock("s").await;
            guard.commit_exchange(Turn::user(format!("q{i}")), Turn::model(format!("a{i}")));
        }

        let history = store.get("s").await;
        assert_eq!(
            history,
            vec![
                Turn::user("q1"),
                Turn::model("a1"),
                Turn::user("q2"),
                Turn::model("a2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_odd_window_rounds_down() {
        let store = SessionStore::new(3);
        let mut guard = store.lock("s").await;
        guard.commit_exchange(Turn::user("q0"), Turn::model("a0"));
        guard.commit_exchange(Turn::user("q1"), Turn::model("a1"));
        assert_eq!(guard.history().len(), 2);
        assert_eq!(guard.history()[0], Turn::user("q1"));
    }

    #[tokio::test]
    async fn test_lock_serialises_same_session() {
        let store = Arc::new(SessionStore::default());
        let guard = store.lock("s").await;

        let contender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.append("s", Turn::user("late")).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        assert!(guard.history().is_empty());

        drop(guard);
        contender.await.unwrap();
        assert_eq!(store.get("s").await, vec![Turn::user("late")]);
    }

    #[tokio::test]
    async fn test_lock_does_not_block_other_sessions() {
        let store = SessionStore::default();
        let _held = store.lock("busy").await;

        let result = tokio::time::timeout(
            Duration::from_millis(200),
            store.append("free", Turn::user("hi")),
        )
        .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_role_serialises_lowercase() {
        let json = serde_json::to_value(Turn::model("x")).unwrap();
        assert_eq!(json["role"], "model");
    }
}
