//! The role agent executor

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use super::memory::{LongTermMemory, RETRIEVED_MEMORY_KEY};
use super::prompt::render_template;
use super::roles::RoleStrategy;
use crate::agents::config::AgentConfig;
use crate::agents::domain::{
    AgentChunk, AgentInput, AgentResponse, AgentStream, AgentStreamSender, AgentType, Message,
    TokenUsage,
};
use crate::agents::error::AgentResult;
use crate::agents::llm::{ChatRequest, ChatResponse, ModelClient};
use crate::agents::rag::RagHelper;
use crate::agents::tools::{ToolHelper, ToolScope};

const MEMORY_SEARCH_LIMIT: usize = 5;

/// Trait for executable agents
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn agent_type(&self) -> AgentType;

    /// Get the agent's configuration
    fn config(&self) -> &AgentConfig;

    /// Model this agent calls
    fn model(&self) -> &str;

    /// Run to completion. Failures are reported in the response status.
    async fn execute(&self, input: AgentInput) -> AgentResponse;

    /// Run with incremental output, ending in [`AgentChunk::Done`]
    fn execute_stream(&self, input: AgentInput) -> AgentStream;
}

/// One agent implementation for every role; the role only changes its
/// [`RoleStrategy`]
#[derive(Clone)]
pub struct RoleAgent {
    config: AgentConfig,
    strategy: &'static RoleStrategy,
    client: Arc<dyn ModelClient>,
    tools: Option<Arc<ToolHelper>>,
    rag: Option<Arc<RagHelper>>,
    memory: Option<Arc<dyn LongTermMemory>>,
}

impl RoleAgent {
    pub fn new(config: AgentConfig, client: Arc<dyn ModelClient>) -> Self {
        let strategy = RoleStrategy::for_type(config.agent_type);
        Self {
            config,
            strategy,
            client,
            tools: None,
            rag: None,
            memory: None,
        }
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

    pub fn strategy(&self) -> &'static RoleStrategy {
        self.strategy
    }

    /// System prompt: rendered template, else the literal prompt, else the
    /// role default
    pub fn system_prompt(&self, input: &AgentInput) -> String {
        if let Some(template) = self
            .config
            .prompt_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        {
            match render_template(template, &input.variables) {
                Ok(rendered) => return rendered,
                Err(e) => {
                    tracing::warn!(agent_id = %self.config.id, error = %e, "Falling back from prompt template");
                }
            }
        }

        match self
            .config
            .system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
        {
            Some(prompt) => prompt.to_string(),
            None => self.strategy.default_prompt.to_string(),
        }
    }

    fn uses_tools(&self) -> bool {
        self.strategy.uses_tools && self.tools.is_some() && !self.config.allowed_tools.is_empty()
    }

    /// Enrich the input and build the message list:
    /// system prompt, history, current user turn
    pub async fn prepare(&self, input: &mut AgentInput) -> Vec<Message> {
        if let Some(rag) = &self.rag {
            rag.enrich_with_knowledge(&self.config, input, Some(self.client.as_ref()))
                .await;
        }

        if self.strategy.searches_memory {
            self.recall_memories(input).await;
        }

        let mut system = RagHelper::inject_knowledge_into_prompt(&self.system_prompt(input), input);
        if let Some(memories) = input
            .context
            .data_str(RETRIEVED_MEMORY_KEY)
            .filter(|m| !m.is_empty())
        {
            system.push_str("\n\nRelevant memories:\n");
            system.push_str(memories);
        }

        let mut messages = Vec::with_capacity(input.history.len() + 2);
        messages.push(Message::system(system));
        messages.extend(input.history.iter().cloned());
        messages.push(Message::user(self.strategy.user_turn(input)));
        messages
    }

    async fn recall_memories(&self, input: &mut AgentInput) {
        let Some(memory) = &self.memory else {
            return;
        };
        let query = input.content.trim();
        if query.is_empty() {
            return;
        }

        match memory
            .search(
                &input.context.tenant_id,
                &input.context.user_id,
                query,
                MEMORY_SEARCH_LIMIT,
            )
            .await
        {
            Ok(hits) if !hits.is_empty() => {
                let text = hits
                    .iter()
                    .map(|h| format!("- {}", h.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                input
                    .context
                    .data
                    .insert(RETRIEVED_MEMORY_KEY.to_string(), Value::String(text));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(agent_id = %self.config.id, error = %e, "Memory search failed");
            }
        }
    }

    async fn complete(&self, messages: Vec<Message>, input: &AgentInput) -> AgentResult<ChatResponse> {
        if self.uses_tools() {
            if let Some(tools) = &self.tools {
                let scope = ToolScope {
                    tenant_id: &input.context.tenant_id,
                    user_id: &input.context.user_id,
                    agent_name: &self.config.name,
                };
                return tools
                    .execute_with_tools(
                        self.client.as_ref(),
                        messages,
                        self.config.temperature,
                        self.config.max_tokens,
                        scope,
                        &self.config.allowed_tools,
                    )
                    .await;
            }
        }

        let request = ChatRequest::new(messages, self.config.temperature, self.config.max_tokens);
        Ok(self.client.chat_completion(request).await?)
    }

    async fn stream_into(self, mut input: AgentInput, sender: AgentStreamSender) {
        let started = Instant::now();

        let messages = self.prepare(&mut input).await;

        // Tool rounds are not streamed; the final answer arrives as one chunk
        if self.uses_tools() {
            let response = match self.complete(messages, &input).await {
                Ok(response) => response,
                Err(e) => {
                    let _ = sender.send_error(e).await;
                    return;
                }
            };
            let usage = response.usage.unwrap_or_default();
            let _ = sender.send(AgentChunk::text(response.content())).await;
            let _ = sender
                .send(AgentChunk::done(
                    AgentResponse::success(response.content(), usage, elapsed_ms(started))
                        .with_model(self.client.model()),
                ))
                .await;
            return;
        }

        let request = ChatRequest {
            stream: true,
            ..ChatRequest::new(messages, self.config.temperature, self.config.max_tokens)
        };
        let mut stream = self.client.chat_completion_stream(request);
        let mut content = String::new();
        let mut usage = TokenUsage::default();

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    if !chunk.content.is_empty() {
                        content.push_str(&chunk.content);
                        if sender.send(AgentChunk::text(chunk.content)).await.is_err() {
                            return;
                        }
                    }
                    if let Some(u) = chunk.usage {
                        usage = u;
                        let _ = sender.send(AgentChunk::Usage { usage }).await;
                    }
                }
                Err(e) => {
                    let _ = sender.send_error(e.into()).await;
                    return;
                }
            }
        }

        let _ = sender
            .send(AgentChunk::done(
                AgentResponse::success(content, usage, elapsed_ms(started))
                    .with_model(self.client.model()),
            ))
            .await;
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[async_trait]
impl Agent for RoleAgent {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn agent_type(&self) -> AgentType {
        self.config.agent_type
    }

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn model(&self) -> &str {
        self.client.model()
    }

    async fn execute(&self, mut input: AgentInput) -> AgentResponse {
        let started = Instant::now();
        let messages = self.prepare(&mut input).await;

        match self.complete(messages, &input).await {
            Ok(response) => AgentResponse::success(
                response.content(),
                response.usage.unwrap_or_default(),
                elapsed_ms(started),
            )
            .with_model(self.client.model()),
            Err(e) => {
                tracing::warn!(agent_id = %self.config.id, error = %e, "Agent execution failed");
                AgentResponse::failed(e.to_string(), elapsed_ms(started)).with_model(self.client.model())
            }
        }
    }

    fn execute_stream(&self, input: AgentInput) -> AgentStream {
        let (sender, stream) = AgentStream::channel(64);
        let agent = self.clone();

        tokio::spawn(async move {
            agent.stream_into(input, sender).await;
        });

        stream
    }
}
