//! Per-session chat state, kept in process memory only.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::{AgentError, Role};

/// One line of the visible transcript.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
}

impl ChatEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    api_key: String,
    pub transcript: Vec<ChatEntry>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    turn: Arc<Mutex<()>>,
}

impl Session {
    fn new(api_key: String) -> Self {
        let now = Utc::now();
        Self {
            api_key,
            transcript: vec![],
            created_at: now,
            last_active: now,
            turn: Arc::new(Mutex::new(())),
        }
    }
}

fn validate_key(api_key: &str) -> Result<String, AgentError> {
    let key = api_key.trim();
    if key.is_empty() {
        return Err(AgentError::Config("Please enter your Groq API key.".into()));
    }
    Ok(key.to_string())
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, api_key: &str) -> Result<Uuid, AgentError> {
        let key = validate_key(api_key)?;
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, Session::new(key));
        Ok(id)
    }

    pub async fn set_api_key(&self, id: Uuid, api_key: &str) -> Result<(), AgentError> {
        let key = validate_key(api_key)?;
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))?;
        session.api_key = key;
        session.last_active = Utc::now();
        Ok(())
    }

    pub async fn api_key(&self, id: Uuid) -> Result<String, AgentError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|s| s.api_key.clone())
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))
    }

    pub async fn transcript(&self, id: Uuid) -> Result<Vec<ChatEntry>, AgentError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|s| s.transcript.clone())
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))
    }

    pub async fn push(&self, id: Uuid, entry: ChatEntry) -> Result<(), AgentError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))?;
        session.transcript.push(entry);
        session.last_active = Utc::now();
        Ok(())
    }

    /// Waits until no other turn is running on this session.
    ///
    /// Hold the guard from the user entry to the assistant entry so that
    /// overlapping requests cannot interleave the transcript.
    pub async fn begin_turn(&self, id: Uuid) -> Result<OwnedMutexGuard<()>, AgentError> {
        let turn = self
            .sessions
            .read()
            .await
            .get(&id)
            .map(|s| s.turn.clone())
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))?;
        Ok(turn.lock_owned().await)
    }

    pub async fn clear(&self, id: Uuid) -> Result<(), AgentError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))?;
        session.transcript.clear();
        Ok(())
    }

    /// Drops sessions idle for longer than `max_idle`; returns how many went.
    pub async fn prune_older_than(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return 0;
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_active >= cutoff);
        before - sessions.len()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_key_is_rejected() {
        let store = SessionStore::new();
        let err = store.create("   ").await.unwrap_err();
        assert!(err.to_string().contains("Please enter your Groq API key"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn transcript_keeps_order() {
        let store = SessionStore::new();
        let id = store.create("gsk_test").await.unwrap();
        store.push(id, ChatEntry::user("What is RAG?")).await.unwrap();
        store.push(id, ChatEntry::assistant("Retrieval-augmented generation.")).await.unwrap();

        let transcript = store.transcript(id).await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new();
        let a = store.create("key-a").await.unwrap();
        let b = store.create("key-b").await.unwrap();
        store.push(a, ChatEntry::user("hello")).await.unwrap();

        assert_eq!(store.transcript(a).await.unwrap().len(), 1);
        assert!(store.transcript(b).await.unwrap().is_empty());
        assert_eq!(store.api_key(b).await.unwrap(), "key-b");
    }

    #[tokio::test]
    async fn key_is_trimmed_and_replaceable() {
        let store = SessionStore::new();
        let id = store.create("  old  ").await.unwrap();
        assert_eq!(store.api_key(id).await.unwrap(), "old");
        store.set_api_key(id, "new").await.unwrap();
        assert_eq!(store.api_key(id).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn unknown_session_errors() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.transcript(id).await,
            Err(AgentError::SessionNotFound(_))
        ));
        assert!(!store.remove(id).await);
    }

    #[tokio::test]
    async fn idle_sessions_are_pruned() {
        let store = SessionStore::new();
        let stale = store.create("stale").await.unwrap();
        let busy = store.create("busy").await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        store.push(busy, ChatEntry::user("still here")).await.unwrap();

        assert_eq!(store.prune_older_than(Duration::from_millis(30)).await, 1);
        assert!(store.api_key(stale).await.is_err());
        assert_eq!(store.transcript(busy).await.unwrap().len(), 1);

        assert_eq!(store.prune_older_than(Duration::from_secs(3600)).await, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn turns_on_one_session_are_exclusive() {
        let store = SessionStore::new();
        let a = store.create("k").await.unwrap();
        let b = store.create("k").await.unwrap();

        let guard = store.begin_turn(a).await.unwrap();
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), store.begin_turn(a)).await;
        assert!(blocked.is_err());

        // Other sessions are not held up
        assert!(store.begin_turn(b).await.is_ok());

        drop(guard);
        assert!(store.begin_turn(a).await.is_ok());
    }

    #[tokio::test]
    async fn clear_and_remove() {
        let store = SessionStore::new();
        let id = store.create("k").await.unwrap();
        store.push(id, ChatEntry::user("x")).await.unwrap();
        store.clear(id).await.unwrap();
        assert!(store.transcript(id).await.unwrap().is_empty());
        assert!(store.remove(id).await);
        assert_eq!(store.len().await, 0);
    }
}
