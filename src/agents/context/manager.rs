//! Session lifecycle, history retrieval and summary memory

use moka::future::Cache;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::store::{InMemorySessionStore, SessionStore, TtlSessionStore};
use super::trim::{limit_messages, trim_to_token_budget};
use crate::agents::background::BackgroundTasks;
use crate::agents::domain::{
    AgentInput, Message, Role, Session, SUMMARY_KEY, SUMMARY_MESSAGE_COUNT_KEY,
};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::params::MemoryMode;
use crate::agents::token::{CharRatioCounter, TiktokenCounter, Tokenizer};
use crate::config::{ContextSettings, SessionStoreKind, TokenizerKind};

const REFRESH_TIMEOUT: Duration = Duration::from_secs(5);
const SESSION_LOCK_CAPACITY: u64 = 100_000;
const SESSION_LOCK_IDLE: Duration = Duration::from_secs(600);

/// Owns sessions: creation, history, per-session data and rolling summaries
pub struct ContextManager {
    store: Arc<dyn SessionStore>,
    tokenizer: Arc<dyn Tokenizer>,
    background: BackgroundTasks,
    settings: ContextSettings,
    /// Per-session locks serializing read-modify-write cycles
    locks: Cache<String, Arc<Mutex<()>>>,
}

impl ContextManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        tokenizer: Arc<dyn Tokenizer>,
        background: BackgroundTasks,
        settings: ContextSettings,
    ) -> Self {
        Self {
            store,
            tokenizer,
            background,
            settings,
            locks: Cache::builder()
                .max_capacity(SESSION_LOCK_CAPACITY)
                .time_to_idle(SESSION_LOCK_IDLE)
                .build(),
        }
    }

    /// Lock guarding writes to one session; other sessions never wait on it
    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .get_with(session_id.to_string(), async { Arc::new(Mutex::new(())) })
            .await
    }

    /// Build the configured store and tokenizer
    pub fn from_settings(settings: &ContextSettings, background: BackgroundTasks) -> Self {
        let store: Arc<dyn SessionStore> = match settings.store {
            SessionStoreKind::Memory => Arc::new(InMemorySessionStore::new()),
            SessionStoreKind::Ttl => Arc::new(TtlSessionStore::new(Duration::from_secs(
                settings.session_ttl_seconds,
            ))),
        };
        let tokenizer: Arc<dyn Tokenizer> = match settings.tokenizer {
            TokenizerKind::Tiktoken => Arc::new(TiktokenCounter::new()),
            TokenizerKind::Approximate => Arc::new(CharRatioCounter::new()),
        };
        Self::new(store, tokenizer, background, settings.clone())
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    /// Create (or overwrite) a session
    pub async fn create_session(
        &self,
        tenant_id: &str,
        user_id: &str,
        session_id: &str,
    ) -> AgentResult<Session> {
        let session = Session::new(session_id, tenant_id, user_id);
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;
        self.store.save(&session).await?;
        tracing::debug!(tenant_id, user_id, session_id, "Created session");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> AgentResult<Session> {
        self.store.get(session_id).await
    }

    /// Get a session, creating it when absent.
    ///
    /// On a hit, `updated_at` is refreshed in the background; the refresh
    /// never blocks or fails this call.
    pub async fn get_or_create_session(
        &self,
        tenant_id: &str,
        user_id: &str,
        session_id: &str,
    ) -> AgentResult<Session> {
        match self.store.get(session_id).await {
            Ok(session) => {
                let store = self.store.clone();
                let lock = self.session_lock(session_id).await;
                let id = session_id.to_string();
                self.background.spawn("session_refresh", REFRESH_TIMEOUT, async move {
                    let _guard = lock.lock().await;
                    let mut session = store.get(&id).await?;
                    session.touch();
                    store.save(&session).await
                });
                Ok(session)
            }
            Err(AgentError::SessionNotFound(_)) => {
                self.create_session(tenant_id, user_id, session_id).await
            }
            Err(e) => Err(e),
        }
    }

    /// Append one message; never creates the session
    pub async fn add_message(&self, session_id: &str, role: Role, content: &str) -> AgentResult<()> {
        self.update(session_id, |session| {
            session.add_message(Message::new(role, content));
        })
        .await
    }

    /// History with a count cap and an optional token budget.
    ///
    /// `limit == 0` keeps every message; `max_tokens == 0` skips token
    /// trimming. A token counting failure falls back to the count-capped list.
    pub async fn get_history(
        &self,
        session_id: &str,
        limit: usize,
        max_tokens: usize,
        model: &str,
    ) -> AgentResult<Vec<Message>> {
        let session = self.store.get(session_id).await?;
        let history = limit_messages(&session.messages, limit);
        Ok(self.trim_history(history, max_tokens, model, session_id))
    }

    fn trim_history(
        &self,
        history: Vec<Message>,
        max_tokens: usize,
        model: &str,
        session_id: &str,
    ) -> Vec<Message> {
        if max_tokens == 0 {
            return history;
        }
        match trim_to_token_budget(&history, max_tokens, model, self.tokenizer.as_ref()) {
            Ok(trimmed) => trimmed,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Token trimming failed, using count-limited history");
                history
            }
        }
    }

    /// Load trimmed history into `input`.
    ///
    /// In summary memory mode a stored summary is prepended as a system
    /// message. A missing session leaves the input untouched.
    pub async fn enrich_input(
        &self,
        input: &mut AgentInput,
        session_id: &str,
        history_limit: usize,
        max_tokens: usize,
        model: &str,
    ) -> AgentResult<()> {
        let session = match self.store.get(session_id).await {
            Ok(session) => session,
            Err(AgentError::SessionNotFound(_)) => {
                tracing::debug!(session_id, "No session to enrich from");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let history = limit_messages(&session.messages, history_limit);
        let history = self.trim_history(history, max_tokens, model, session_id);

        let mut messages = Vec::with_capacity(history.len() + 1);
        if MemoryMode::from_params(&input.extra_params) == MemoryMode::Summary {
            if let Some(summary) = session.summary() {
                messages.push(Message::system(summary));
            }
        }
        messages.extend(history);

        input.history = messages;
        Ok(())
    }

    pub async fn set_data(&self, session_id: &str, key: &str, value: Value) -> AgentResult<()> {
        self.update(session_id, |session| {
            session.data.insert(key.to_string(), value);
            session.touch();
        })
        .await
    }

    /// Read one data key; `DataKeyNotFound` when the session has no such key
    pub async fn get_data(&self, session_id: &str, key: &str) -> AgentResult<Value> {
        let session = self.store.get(session_id).await?;
        session
            .data
            .get(key)
            .cloned()
            .ok_or_else(|| AgentError::DataKeyNotFound {
                session_id: session_id.to_string(),
                key: key.to_string(),
            })
    }

    /// Append the user turn then the assistant answer
    pub async fn save_interaction(
        &self,
        session_id: &str,
        user_input: &str,
        agent_output: &str,
    ) -> AgentResult<()> {
        self.update(session_id, |session| {
            session.add_message(Message::user(user_input));
            session.add_message(Message::assistant(agent_output));
        })
        .await
    }

    pub async fn delete_session(&self, session_id: &str) -> AgentResult<()> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;
        self.store.delete(session_id).await?;
        self.locks.invalidate(session_id).await;
        Ok(())
    }

    /// Stored summary and the history length it covers
    pub async fn get_summary(&self, session_id: &str) -> AgentResult<Option<(String, usize)>> {
        let session = self.store.get(session_id).await?;
        Ok(session
            .summary()
            .map(|s| (s.to_string(), session.summary_message_count())))
    }

    /// Store a rolling summary.
    ///
    /// Returns `false` without writing when `message_count` is lower than the
    /// count already stored.
    pub async fn store_summary(
        &self,
        session_id: &str,
        summary: &str,
        message_count: usize,
    ) -> AgentResult<bool> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;
        let mut session = self.store.get(session_id).await?;

        let current = session.summary_message_count();
        if message_count < current {
            tracing::debug!(session_id, current, message_count, "Refusing to store an older summary");
            return Ok(false);
        }

        session
            .data
            .insert(SUMMARY_KEY.to_string(), Value::String(summary.to_string()));
        session
            .data
            .insert(SUMMARY_MESSAGE_COUNT_KEY.to_string(), Value::from(message_count as u64));
        session.touch();
        self.store.save(&session).await?;
        Ok(true)
    }

    async fn update<F>(&self, session_id: &str, apply: F) -> AgentResult<()>
    where
        F: FnOnce(&mut Session),
    {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;
        let mut session = self.store.get(session_id).await?;
        apply(&mut session);
        self.store.save(&session).await
    }
}
