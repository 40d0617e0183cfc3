//! Shared test doubles for integration tests
#![allow(dead_code)]

use agentry::agents::background::BackgroundTasks;
use agentry::agents::config::{AgentConfig, InMemoryAgentConfigStore};
use agentry::agents::context::{ContextManager, InMemorySessionStore, SessionStore};
use agentry::agents::core::{LongTermMemory, MemoryHit};
use agentry::agents::domain::{Session, TokenUsage, ToolCall, ToolDefinition};
use agentry::agents::error::{AgentError, AgentResult, LlmError, LlmResult};
use agentry::agents::llm::{
    ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, FinishReason, LlmStream,
    ModelClient, ModelPricing, ModelProvider,
};
use agentry::agents::metrics::AgentMetrics;
use agentry::agents::rag::{KnowledgeRetriever, RetrievedChunk};
use agentry::agents::token::{CharRatioCounter, Tokenizer};
use agentry::agents::tools::InMemoryToolRegistry;
use agentry::agents::Registry;
use agentry::config::{ContextSettings, Settings};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn usage() -> TokenUsage {
    TokenUsage::new(10, 5)
}

/// Model double answering from a script, then from a fixed fallback
pub struct ScriptedModel {
    model: String,
    script: Mutex<VecDeque<LlmResult<ChatResponse>>>,
    fallback: ChatResponse,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Option<Duration>,
    pricing: Option<ModelPricing>,
}

impl ScriptedModel {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: ChatResponse::text("ok", Some(usage())),
            requests: Mutex::new(Vec::new()),
            delay: None,
            pricing: None,
        }
    }

    /// A model that requests `tool` on every turn
    pub fn always_calling_tool(model: &str, tool: &str) -> Self {
        let mut scripted = Self::new(model);
        scripted.fallback = ChatResponse::with_tool_calls(
            "",
            vec![ToolCall::new("call_1", tool, r#"{"q": "x"}"#)],
            Some(usage()),
        );
        scripted
    }

    pub fn reply(self, text: &str) -> Self {
        self.push(Ok(ChatResponse::text(text, Some(usage()))))
    }

    pub fn respond(self, response: ChatResponse) -> Self {
        self.push(Ok(response))
    }

    pub fn fail(self, error: LlmError) -> Self {
        self.push(Err(error))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    fn push(self, item: LlmResult<ChatResponse>) -> Self {
        self.script.lock().unwrap().push_back(item);
        self
    }

    fn next(&self, request: ChatRequest) -> LlmResult<ChatResponse> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model(&self) -> &str {
        &self.model
    }

    fn pricing(&self) -> Option<ModelPricing> {
        self.pricing
    }

    async fn chat_completion(&self, request: ChatRequest) -> LlmResult<ChatResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next(request)
    }

    fn chat_completion_stream(&self, request: ChatRequest) -> LlmStream {
        let (sender, stream) = LlmStream::channel(16);
        let next = self.next(request);
        tokio::spawn(async move {
            match next {
                Ok(response) => {
                    for word in response.content().split_inclusive(' ') {
                        let _ = sender.send_text(word).await;
                    }
                    let _ = sender.send_finish(FinishReason::Stop, response.usage).await;
                }
                Err(e) => {
                    let _ = sender.send_error(e).await;
                }
            }
        });
        stream
    }

    async fn embedding(&self, request: EmbeddingRequest) -> LlmResult<EmbeddingResponse> {
        Ok(EmbeddingResponse {
            embeddings: request.input.iter().map(|_| vec![0.0; 4]).collect(),
            usage: None,
        })
    }
}

/// Provider serving a fixed set of clients by model id
#[derive(Default)]
pub struct StaticProvider {
    clients: HashMap<String, Arc<dyn ModelClient>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, client: Arc<ScriptedModel>) -> Self {
        self.clients
            .insert(client.model().to_string(), client as Arc<dyn ModelClient>);
        self
    }
}

#[async_trait]
impl ModelProvider for StaticProvider {
    async fn get_client(&self, _tenant_id: &str, model_id: &str) -> LlmResult<Arc<dyn ModelClient>> {
        self.clients
            .get(model_id)
            .cloned()
            .ok_or_else(|| LlmError::ModelNotFound(model_id.to_string()))
    }
}

/// Retriever returning fixed chunks and counting calls
pub struct CountingRetriever {
    chunks: Vec<RetrievedChunk>,
    calls: AtomicUsize,
}

impl CountingRetriever {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            chunks,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeRetriever for CountingRetriever {
    async fn search(
        &self,
        _knowledge_base_id: &str,
        _tenant_id: &str,
        _query: &str,
        top_k: usize,
    ) -> AgentResult<Vec<RetrievedChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.chunks.iter().take(top_k).cloned().collect())
    }
}

/// Retriever whose backend is always down
pub struct FailingRetriever;

#[async_trait]
impl KnowledgeRetriever for FailingRetriever {
    async fn search(
        &self,
        _knowledge_base_id: &str,
        _tenant_id: &str,
        _query: &str,
        _top_k: usize,
    ) -> AgentResult<Vec<RetrievedChunk>> {
        Err(AgentError::Retrieval("index unavailable".into()))
    }
}

/// Tokenizer that cannot count anything
pub struct FailingTokenizer;

impl Tokenizer for FailingTokenizer {
    fn count(&self, model: &str, _text: &str) -> AgentResult<usize> {
        Err(AgentError::Internal(format!("no vocabulary for {}", model)))
    }
}

/// In-memory store whose saves for one session stall
pub struct SlowStore {
    inner: InMemorySessionStore,
    slow_session: String,
    delay: Duration,
}

impl SlowStore {
    pub fn new(slow_session: &str, delay: Duration) -> Self {
        Self {
            inner: InMemorySessionStore::new(),
            slow_session: slow_session.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl SessionStore for SlowStore {
    async fn get(&self, session_id: &str) -> AgentResult<Session> {
        self.inner.get(session_id).await
    }

    async fn save(&self, session: &Session) -> AgentResult<()> {
        if session.id == self.slow_session {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.save(session).await
    }

    async fn delete(&self, session_id: &str) -> AgentResult<()> {
        self.inner.delete(session_id).await
    }
}

/// Long-term memory returning fixed hits
pub struct FixedMemory(pub Vec<MemoryHit>);

#[async_trait]
impl LongTermMemory for FixedMemory {
    async fn search(
        &self,
        _tenant_id: &str,
        _user_id: &str,
        _query: &str,
        limit: usize,
    ) -> AgentResult<Vec<MemoryHit>> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }
}

/// Tool registry with a `search` tool that records every input it gets
pub async fn recording_tools() -> (Arc<InMemoryToolRegistry>, Arc<Mutex<Vec<Value>>>) {
    let registry = Arc::new(InMemoryToolRegistry::new());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    registry
        .register(
            ToolDefinition::new(
                "search",
                "Search the web",
                json!({"type": "object", "properties": {"q": {"type": "string"}}}),
            ),
            move |input| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(input.clone());
                    Ok(json!({"results": [input]}))
                }
            },
        )
        .await;

    (registry, seen)
}

/// Context manager with deterministic token counting (ceil(chars / 4) + 4
/// per message)
pub fn context_manager(settings: ContextSettings) -> Arc<ContextManager> {
    Arc::new(ContextManager::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(CharRatioCounter::new()),
        BackgroundTasks::new(4),
        settings,
    ))
}

pub fn context_manager_with(
    store: Arc<dyn SessionStore>,
    tokenizer: Arc<dyn Tokenizer>,
    settings: ContextSettings,
) -> Arc<ContextManager> {
    Arc::new(ContextManager::new(
        store,
        tokenizer,
        BackgroundTasks::new(4),
        settings,
    ))
}

pub fn registry(provider: StaticProvider, configs: Vec<AgentConfig>) -> Registry {
    registry_with_context(provider, configs, context_manager(ContextSettings::default()))
}

pub fn registry_with_context(
    provider: StaticProvider,
    configs: Vec<AgentConfig>,
    context: Arc<ContextManager>,
) -> Registry {
    Registry::new(
        Arc::new(InMemoryAgentConfigStore::new(configs)),
        Arc::new(provider),
        context,
        Arc::new(AgentMetrics::new().unwrap()),
        Settings::default().pricing,
    )
}
