//! Session storage backends

use async_trait::async_trait;
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::agents::domain::Session;
use crate::agents::error::{AgentError, AgentResult};

/// Trait for session storage backends
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session; `SessionNotFound` when absent
    async fn get(&self, session_id: &str) -> AgentResult<Session>;

    /// Insert or overwrite a session
    async fn save(&self, session: &Session) -> AgentResult<()>;

    /// Remove a session; removing an absent session is not an error
    async fn delete(&self, session_id: &str) -> AgentResult<()>;
}

/// In-process session map
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> AgentResult<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))
    }

    async fn save(&self, session: &Session) -> AgentResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> AgentResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }
}

/// Expiring key-value session store
///
/// Sessions are kept as JSON under `session:{id}` and expire a fixed time
/// after their last save.
#[derive(Clone)]
pub struct TtlSessionStore {
    inner: Cache<String, String>,
}

impl TtlSessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, 100_000)
    }

    pub fn with_capacity(ttl: Duration, max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    fn key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }
}

#[async_trait]
impl SessionStore for TtlSessionStore {
    async fn get(&self, session_id: &str) -> AgentResult<Session> {
        let json = self
            .inner
            .get(&Self::key(session_id))
            .await
            .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))?;
        serde_json::from_str(&json)
            .map_err(|e| AgentError::Memory(format!("corrupt session {}: {}", session_id, e)))
    }

    async fn save(&self, session: &Session) -> AgentResult<()> {
        let json = serde_json::to_string(session)?;
        self.inner.insert(Self::key(&session.id), json).await;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> AgentResult<()> {
        self.inner.invalidate(&Self::key(session_id)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::domain::Message;

    async fn exercise(store: &dyn SessionStore) {
        let err = store.get("s1").await.unwrap_err();
        assert!(matches!(err, AgentError::SessionNotFound(_)));

        let mut session = Session::new("s1", "t1", "u1");
        session.add_message(Message::user("hello"));
        store.save(&session).await.unwrap();

        let loaded = store.get("s1").await.unwrap();
        assert_eq!(loaded.messages, session.messages);

        store.delete("s1").await.unwrap();
        assert!(store.get("s1").await.is_err());
        store.delete("s1").await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        exercise(&InMemorySessionStore::new()).await;
    }

    #[tokio::test]
    async fn test_ttl_store() {
        exercise(&TtlSessionStore::new(Duration::from_secs(60))).await;
    }

    #[tokio::test]
    async fn test_ttl_store_expires() {
        let store = TtlSessionStore::new(Duration::from_millis(50));
        store.save(&Session::new("s1", "t1", "u1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.get("s1").await.is_err());
    }
}
