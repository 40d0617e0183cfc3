//! Agent registry: resolves, caches and runs agents end to end

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::agents::background::BackgroundTasks;
use crate::agents::config::{AgentConfig, AgentConfigStore, InMemoryAgentConfigStore};
use crate::agents::context::ContextManager;
use crate::agents::core::{Agent, LongTermMemory, RoleAgent};
use crate::agents::domain::{
    AgentChunk, AgentInput, AgentResponse, AgentStream, AgentType, Message, Role,
};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::{ChatRequest, ModelClient, ModelProvider, PricingTable};
use crate::agents::metrics::AgentMetrics;
use crate::agents::params::{ExecutionOptions, MemoryMode};
use crate::agents::rag::RagHelper;
use crate::agents::runlog::{RunLog, RunRecord, RunUpdate, StepRecord};
use crate::agents::tools::ToolHelper;
use crate::config::Settings;

const COMPRESSION_PROMPT: &str = "Summarize the following conversation excerpt in one short \
paragraph. Keep names, decisions, facts and open questions. Do not add anything new.";

const SESSION_SUMMARY_PROMPT: &str = "Write a structured recap of this conversation for future \
turns. Cover: the user's goals, key facts and preferences, decisions made, and open items. \
Be concise.";

/// A cached agent together with the client it talks to
#[derive(Clone)]
struct ResolvedAgent {
    agent: Arc<dyn Agent>,
    client: Arc<dyn ModelClient>,
}

/// Per-execution bookkeeping shared by the blocking and streaming paths
struct RunContext {
    run_id: String,
    tenant_id: String,
    config: AgentConfig,
    client: Arc<dyn ModelClient>,
    session_id: Option<String>,
    user_content: String,
    memory_mode: MemoryMode,
    started: Instant,
}

/// Entry point for running agents.
///
/// Cheap to clone; clones share the agent cache, session state and metrics.
#[derive(Clone)]
pub struct Registry {
    configs: Arc<dyn AgentConfigStore>,
    provider: Arc<dyn ModelProvider>,
    context: Arc<ContextManager>,
    metrics: Arc<AgentMetrics>,
    pricing: Arc<PricingTable>,
    tools: Option<Arc<ToolHelper>>,
    rag: Option<Arc<RagHelper>>,
    memory: Option<Arc<dyn LongTermMemory>>,
    run_log: Option<Arc<dyn RunLog>>,
    /// Cached agents keyed by (tenant id, agent id)
    agents: Arc<RwLock<HashMap<(String, String), ResolvedAgent>>>,
}

impl Registry {
    pub fn new(
        configs: Arc<dyn AgentConfigStore>,
        provider: Arc<dyn ModelProvider>,
        context: Arc<ContextManager>,
        metrics: Arc<AgentMetrics>,
        pricing: PricingTable,
    ) -> Self {
        Self {
            configs,
            provider,
            context,
            metrics,
            pricing: Arc::new(pricing),
            tools: None,
            rag: None,
            memory: None,
            run_log: None,
            agents: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry over the agents declared in settings, with the configured
    /// session store, tokenizer and background pool
    pub fn from_settings(settings: &Settings, provider: Arc<dyn ModelProvider>) -> AgentResult<Self> {
        let metrics = AgentMetrics::new().map_err(|e| AgentError::Internal(e.to_string()))?;
        let background = BackgroundTasks::new(settings.background.max_concurrent);
        let context = ContextManager::from_settings(&settings.context, background);
        let configs = InMemoryAgentConfigStore::new(settings.agents.clone());

        tracing::info!(agents = settings.agents.len(), "Agent registry initialized");

        Ok(Self::new(
            Arc::new(configs),
            provider,
            Arc::new(context),
            Arc::new(metrics),
            settings.pricing.clone(),
        ))
    }

    pub fn with_tools(mut self, tools: Arc<ToolHelper>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_rag(mut self, rag: Arc<RagHelper>) -> Self {
        self.rag = Some(rag);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn LongTermMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_run_log(mut self, run_log: Arc<dyn RunLog>) -> Self {
        self.run_log = Some(run_log);
        self
    }

    pub fn context(&self) -> &Arc<ContextManager> {
        &self.context
    }

    pub fn metrics(&self) -> &Arc<AgentMetrics> {
        &self.metrics
    }

    /// Get an agent by id, building and caching it on first use
    pub async fn get_agent(&self, tenant_id: &str, agent_id: &str) -> AgentResult<Arc<dyn Agent>> {
        Ok(self.resolve(tenant_id, agent_id).await?.agent)
    }

    /// Get the most recently created agent of a role
    pub async fn get_agent_by_type(
        &self,
        tenant_id: &str,
        agent_type: AgentType,
    ) -> AgentResult<Arc<dyn Agent>> {
        let config = self.configs.latest_by_type(tenant_id, agent_type).await?;
        self.get_agent(tenant_id, &config.id).await
    }

    /// Drop a cached agent so the next call rebuilds it from its config
    pub async fn invalidate(&self, tenant_id: &str, agent_id: &str) -> bool {
        let removed = self
            .agents
            .write()
            .await
            .remove(&(tenant_id.to_string(), agent_id.to_string()))
            .is_some();
        if removed {
            tracing::debug!(tenant_id, agent_id, "Invalidated cached agent");
        }
        removed
    }

    async fn resolve(&self, tenant_id: &str, agent_id: &str) -> AgentResult<ResolvedAgent> {
        let key = (tenant_id.to_string(), agent_id.to_string());

        if let Some(resolved) = self.agents.read().await.get(&key) {
            self.metrics.cache_hits.inc();
            return Ok(resolved.clone());
        }
        self.metrics.cache_misses.inc();

        let config = self.configs.get(tenant_id, agent_id).await?;
        let resolved = self.build(config).await?;

        // A concurrent builder may have won; keep whichever landed first
        let mut agents = self.agents.write().await;
        let entry = agents.entry(key).or_insert(resolved);
        Ok(entry.clone())
    }

    async fn build(&self, config: AgentConfig) -> AgentResult<ResolvedAgent> {
        let client = self.resolve_client(&config).await?;

        let mut agent = RoleAgent::new(config, client.clone());
        if let Some(tools) = &self.tools {
            agent = agent.with_tools(tools.clone());
        }
        if let Some(rag) = &self.rag {
            agent = agent.with_rag(rag.clone());
        }
        if let Some(memory) = &self.memory {
            agent = agent.with_memory(memory.clone());
        }

        tracing::info!(
            tenant_id = %agent.config().tenant_id,
            agent_id = %agent.config().id,
            agent_type = %agent.agent_type(),
            model = client.model(),
            "Built agent"
        );

        Ok(ResolvedAgent {
            agent: Arc::new(agent),
            client,
        })
    }

    /// Primary model client, or the secondary model when the primary cannot
    /// be resolved
    async fn resolve_client(&self, config: &AgentConfig) -> AgentResult<Arc<dyn ModelClient>> {
        match self.provider.get_client(&config.tenant_id, &config.model).await {
            Ok(client) => Ok(client),
            Err(primary_err) => {
                let Some(secondary) = config
                    .secondary_model
                    .as_deref()
                    .filter(|m| !m.is_empty())
                else {
                    return Err(primary_err.into());
                };
                tracing::warn!(
                    agent_id = %config.id,
                    model = %config.model,
                    secondary_model = secondary,
                    error = %primary_err,
                    "Primary model unavailable, using secondary"
                );
                Ok(self.provider.get_client(&config.tenant_id, secondary).await?)
            }
        }
    }

    /// Run an agent to completion.
    ///
    /// Only agent resolution errors surface as `Err`; execution failures are
    /// reported through the response status.
    pub async fn execute(
        &self,
        tenant_id: &str,
        agent_id: &str,
        mut input: AgentInput,
    ) -> AgentResult<AgentResponse> {
        let resolved = self.resolve(tenant_id, agent_id).await?;
        let run = self.begin_run(tenant_id, &resolved, &mut input).await;

        let timeout_secs = run.config.timeout_seconds.max(1);
        let in_flight = self.metrics.track_in_flight();
        let response = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            resolved.agent.execute(input),
        )
        .await
        {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(tenant_id, agent_id, timeout_secs, "Agent execution timed out");
                AgentResponse::failed(
                    AgentError::Timeout(timeout_secs).to_string(),
                    run.started.elapsed().as_millis() as u64,
                )
                .with_model(resolved.client.model())
            }
        };
        drop(in_flight);

        Ok(self.finish_run(&run, response).await)
    }

    /// Run an agent with incremental output.
    ///
    /// History enrichment matches [`Registry::execute`]; the final
    /// [`AgentChunk::Done`] response carries the cost, and the interaction
    /// is persisted once it arrives.
    pub async fn execute_stream(
        &self,
        tenant_id: &str,
        agent_id: &str,
        mut input: AgentInput,
    ) -> AgentResult<AgentStream> {
        let resolved = self.resolve(tenant_id, agent_id).await?;
        let run = self.begin_run(tenant_id, &resolved, &mut input).await;

        let mut inner = resolved.agent.execute_stream(input);
        let (sender, stream) = AgentStream::channel(64);
        let registry = self.clone();

        tokio::spawn(async move {
            while let Some(item) = inner.next().await {
                match item {
                    Ok(AgentChunk::Done { response }) => {
                        let response = registry.finish_run(&run, response).await;
                        let _ = sender.send(AgentChunk::done(response)).await;
                        return;
                    }
                    Ok(chunk) => {
                        if sender.send(chunk).await.is_err() {
                            tracing::debug!(run_id = %run.run_id, "Stream consumer went away");
                            return;
                        }
                    }
                    Err(e) => {
                        let failed = AgentResponse::failed(
                            e.to_string(),
                            run.started.elapsed().as_millis() as u64,
                        )
                        .with_model(run.client.model());
                        registry.finish_run(&run, failed).await;
                        let _ = sender.send_error(e).await;
                        return;
                    }
                }
            }
        });

        Ok(stream)
    }

    /// Open the run record and load session history into `input`
    async fn begin_run(
        &self,
        tenant_id: &str,
        resolved: &ResolvedAgent,
        input: &mut AgentInput,
    ) -> RunContext {
        let config = resolved.agent.config().clone();
        let options = ExecutionOptions::resolve(&input.extra_params, self.context.settings());
        let run = RunContext {
            run_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            config,
            client: resolved.client.clone(),
            session_id: input.session_id().map(str::to_string),
            user_content: input.content.clone(),
            memory_mode: options.memory_mode,
            started: Instant::now(),
        };

        if let Some(run_log) = &self.run_log {
            let record = RunRecord {
                run_id: run.run_id.clone(),
                tenant_id: tenant_id.to_string(),
                user_id: input.context.user_id.clone(),
                agent_id: run.config.id.clone(),
                session_id: run.session_id.clone(),
                trace_id: input.context.trace_id.clone(),
                input: input.content.clone(),
                started_at: Utc::now(),
            };
            if let Err(e) = run_log.start_run(record).await {
                tracing::warn!(run_id = %run.run_id, error = %e, "Failed to record run start");
            }
        }

        if let Some(session_id) = run.session_id.as_deref() {
            self.load_history(&run, input, session_id, &options).await;
        }

        run
    }

    async fn load_history(
        &self,
        run: &RunContext,
        input: &mut AgentInput,
        session_id: &str,
        options: &ExecutionOptions,
    ) {
        let model = run.client.model();
        if let Err(e) = self
            .context
            .enrich_input(
                input,
                session_id,
                options.history_limit_or_zero(),
                options.history_max_tokens,
                model,
            )
            .await
        {
            tracing::warn!(session_id, error = %e, "Failed to load session history");
            return;
        }

        let tokens = match self.context.tokenizer().count_messages(model, &input.history) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Token count failed, skipping compression");
                return;
            }
        };
        if tokens <= options.compression_threshold {
            return;
        }

        let started = Instant::now();
        let before = input.history.len();
        let outcome = self
            .compress_history(
                &input.history,
                options.compression_threshold,
                model,
                run.client.as_ref(),
            )
            .await;

        let (success, detail) = match outcome {
            Ok(compressed) => {
                tracing::info!(
                    session_id,
                    tokens,
                    before,
                    after = compressed.len(),
                    "Compressed session history"
                );
                self.metrics.record_compression("compressed");
                let detail = format!("{} -> {} messages", before, compressed.len());
                input.history = compressed;
                (true, detail)
            }
            Err(e) => {
                tracing::warn!(session_id, error = %e, "History compression failed, continuing uncompressed");
                self.metrics.record_compression("failed");
                (false, e.to_string())
            }
        };
        self.log_step(run, "compress_history", success, Some(detail), started)
            .await;
    }

    /// Apply cost, report the run, and persist the interaction
    async fn finish_run(&self, run: &RunContext, response: AgentResponse) -> AgentResponse {
        let cost = self
            .pricing
            .cost(run.client.model(), run.client.pricing(), &response.usage);
        let response = response.with_cost(cost);

        self.metrics.record_execution(
            run.config.agent_type.as_str(),
            &run.tenant_id,
            &response,
            run.started.elapsed().as_secs_f64(),
        );

        if response.is_success() {
            tracing::info!(
                tenant_id = %run.tenant_id,
                agent_id = %run.config.id,
                latency_ms = response.latency_ms,
                total_tokens = response.usage.total_tokens,
                "Agent execution completed"
            );
        } else {
            tracing::warn!(
                tenant_id = %run.tenant_id,
                agent_id = %run.config.id,
                error = response.error.as_deref().unwrap_or_default(),
                "Agent execution failed"
            );
        }

        self.log_step(
            run,
            "agent",
            response.is_success(),
            response.error.clone(),
            run.started,
        )
        .await;
        if let Some(run_log) = &self.run_log {
            if let Err(e) = run_log
                .finish_run(RunUpdate::from_response(run.run_id.clone(), &response))
                .await
            {
                tracing::warn!(run_id = %run.run_id, error = %e, "Failed to record run result");
            }
        }

        if response.is_success() {
            if let Some(session_id) = run.session_id.as_deref() {
                match self
                    .context
                    .save_interaction(session_id, &run.user_content, &response.output)
                    .await
                {
                    Ok(()) => {
                        if run.memory_mode == MemoryMode::Summary {
                            self.maybe_summarize_session(&run.config, session_id);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(session_id, error = %e, "Failed to save interaction");
                    }
                }
            }
        }

        response
    }

    async fn log_step(
        &self,
        run: &RunContext,
        name: &str,
        success: bool,
        detail: Option<String>,
        started: Instant,
    ) {
        let Some(run_log) = &self.run_log else {
            return;
        };
        let step = StepRecord {
            run_id: run.run_id.clone(),
            name: name.to_string(),
            success,
            detail,
            latency_ms: started.elapsed().as_millis() as u64,
        };
        if let Err(e) = run_log.record_step(step).await {
            tracing::warn!(run_id = %run.run_id, step = name, error = %e, "Failed to record run step");
        }
    }

    /// Shrink `messages` to fit `budget` by summarizing the older part.
    ///
    /// A leading system message is kept. Half the budget goes to the system
    /// message plus the most recent messages; everything older becomes one
    /// `historical summary: ...` system message. When the system message and
    /// the newest message alone exceed the budget, only the newest message
    /// is returned.
    pub async fn compress_history(
        &self,
        messages: &[Message],
        budget: usize,
        model: &str,
        client: &dyn ModelClient,
    ) -> AgentResult<Vec<Message>> {
        let tokenizer = self.context.tokenizer();

        let (system, rest) = match messages.split_first() {
            Some((first, rest)) if first.role == Role::System => (Some(first), rest),
            _ => (None, messages),
        };
        let Some(newest) = rest.last() else {
            return Ok(messages.to_vec());
        };

        let system_cost = match system {
            Some(m) => tokenizer.count_message(model, m)?,
            None => 0,
        };
        if system_cost + tokenizer.count_message(model, newest)? > budget {
            return Ok(vec![newest.clone()]);
        }

        let recent_budget = budget / 2;
        // The newest message is always kept
        let mut split = rest.len() - 1;
        let mut used = system_cost + tokenizer.count_message(model, newest)?;
        for (i, message) in rest.iter().enumerate().rev().skip(1) {
            let cost = tokenizer.count_message(model, message)?;
            if used + cost > recent_budget {
                break;
            }
            used += cost;
            split = i;
        }

        let (older, recent) = rest.split_at(split);
        if older.len() < 2 {
            return Ok(messages.to_vec());
        }

        let transcript = older
            .iter()
            .map(|m| format!("[{}] {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let request = ChatRequest::new(
            vec![Message::system(COMPRESSION_PROMPT), Message::user(transcript)],
            Some(0.2),
            Some(512),
        );
        let response = client.chat_completion(request).await?;

        let mut compressed = Vec::with_capacity(recent.len() + 2);
        if let Some(system) = system {
            compressed.push(system.clone());
        }
        compressed.push(Message::system(format!(
            "historical summary: {}",
            response.content().trim()
        )));
        compressed.extend(recent.iter().cloned());
        Ok(compressed)
    }

    /// Recompute the session's rolling summary in the background when
    /// enough new messages have accumulated. Never blocks or fails the
    /// caller.
    pub fn maybe_summarize_session(&self, config: &AgentConfig, session_id: &str) {
        let context = self.context.clone();
        let provider = self.provider.clone();
        let tenant_id = config.tenant_id.clone();
        let model = config.summary_model().to_string();
        let session_id = session_id.to_string();
        let deadline = Duration::from_secs(context.settings().summary_timeout_seconds.max(1));

        self.context.background().spawn("session_summary", deadline, async move {
            let stored =
                summarize_if_due(&context, provider.as_ref(), &tenant_id, &model, &session_id)
                    .await?;
            if stored {
                tracing::debug!(session_id = %session_id, model = %model, "Stored session summary");
            }
            Ok(())
        });
    }
}

async fn summarize_if_due(
    context: &ContextManager,
    provider: &dyn ModelProvider,
    tenant_id: &str,
    model: &str,
    session_id: &str,
) -> AgentResult<bool> {
    let session = context.get_session(session_id).await?;
    let settings = context.settings();

    let count = session.message_count();
    if count < settings.summary_trigger_messages {
        return Ok(false);
    }
    if count.saturating_sub(session.summary_message_count()) < settings.summary_min_delta {
        return Ok(false);
    }

    let transcript = session
        .messages
        .iter()
        .map(|m| format!("[{}] {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    let client = provider.get_client(tenant_id, model).await?;
    let request = ChatRequest::new(
        vec![Message::system(SESSION_SUMMARY_PROMPT), Message::user(transcript)],
        Some(0.2),
        Some(1024),
    );
    let response = client.chat_completion(request).await?;

    let recap = response.content().trim();
    if recap.is_empty() {
        return Ok(false);
    }
    context.store_summary(session_id, recap, count).await
}
