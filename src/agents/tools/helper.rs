//! Bounded model <-> tools conversation loop

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::registry::{ToolInvocation, ToolRegistry};
use super::repair::repair_json;
use crate::agents::domain::{Message, TokenUsage, ToolCall, ToolCallResult, ToolDefinition};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::{ChatRequest, ChatResponse, ModelClient, ToolChoice};
use crate::config::ToolSettings;

/// Identity attached to every tool invocation
#[derive(Debug, Clone, Copy)]
pub struct ToolScope<'a> {
    pub tenant_id: &'a str,
    pub user_id: &'a str,
    pub agent_name: &'a str,
}

/// Runs a model in a tool-use loop until it answers without tool calls
pub struct ToolHelper {
    registry: Arc<dyn ToolRegistry>,
    max_rounds: u32,
    call_timeout: Duration,
}

impl ToolHelper {
    pub fn new(registry: Arc<dyn ToolRegistry>, settings: &ToolSettings) -> Self {
        Self {
            registry,
            max_rounds: settings.max_rounds.max(1),
            call_timeout: Duration::from_secs(settings.call_timeout_seconds),
        }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Active tool definitions among `allowed`; lookup failures count as none
    pub async fn resolve_tools(&self, tenant_id: &str, allowed: &[String]) -> Vec<ToolDefinition> {
        if allowed.is_empty() {
            return Vec::new();
        }
        match self.registry.active_tools(tenant_id, allowed).await {
            Ok(tools) => tools,
            Err(e) => {
                tracing::warn!(tenant_id, error = %e, "Tool lookup failed, continuing without tools");
                Vec::new()
            }
        }
    }

    /// Complete `messages`, executing requested tool calls between rounds.
    ///
    /// Without resolvable tools this is a single plain completion. The
    /// returned usage covers every round.
    pub async fn execute_with_tools(
        &self,
        client: &dyn ModelClient,
        messages: Vec<Message>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
        scope: ToolScope<'_>,
        allowed_tools: &[String],
    ) -> AgentResult<ChatResponse> {
        let mut transcript = messages;
        self.execute_with_transcript(
            client,
            &mut transcript,
            temperature,
            max_tokens,
            scope,
            allowed_tools,
        )
        .await
    }

    /// Same as [`execute_with_tools`](Self::execute_with_tools), growing the
    /// caller's transcript with one assistant message and one tool message
    /// per call for each round.
    pub async fn execute_with_transcript(
        &self,
        client: &dyn ModelClient,
        transcript: &mut Vec<Message>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
        scope: ToolScope<'_>,
        allowed_tools: &[String],
    ) -> AgentResult<ChatResponse> {
        let tools = self.resolve_tools(scope.tenant_id, allowed_tools).await;

        if tools.is_empty() {
            let request = ChatRequest::new(transcript.clone(), temperature, max_tokens);
            return Ok(client.chat_completion(request).await?);
        }

        let mut usage = TokenUsage::default();

        for round in 1..=self.max_rounds {
            let request = ChatRequest {
                tools: Some(tools.clone()),
                tool_choice: Some(ToolChoice::Auto),
                ..ChatRequest::new(transcript.clone(), temperature, max_tokens)
            };

            let mut response = client.chat_completion(request).await?;
            if let Some(round_usage) = &response.usage {
                usage.accumulate(round_usage);
            }

            if response.tool_calls().is_empty() {
                response.usage = Some(usage);
                return Ok(response);
            }

            let calls = response.tool_calls().to_vec();
            tracing::debug!(
                round,
                calls = calls.len(),
                agent = scope.agent_name,
                "Executing tool calls"
            );

            let results = self.execute_calls(&calls, scope).await;

            transcript.push(Message::assistant_with_tools(response.content(), calls));
            for result in results {
                let mut message = Message::tool_result(result.tool_call_id, result.content);
                message.name = Some(result.tool_name);
                transcript.push(message);
            }
        }

        tracing::warn!(
            agent = scope.agent_name,
            max_rounds = self.max_rounds,
            "Tool loop exceeded maximum rounds"
        );
        Err(AgentError::MaxToolRounds(self.max_rounds))
    }

    /// Run every call concurrently; results keep the call order
    async fn execute_calls(&self, calls: &[ToolCall], scope: ToolScope<'_>) -> Vec<ToolCallResult> {
        let handles: Vec<_> = calls
            .iter()
            .cloned()
            .map(|call| {
                let registry = Arc::clone(&self.registry);
                let timeout = self.call_timeout;
                let tenant_id = scope.tenant_id.to_string();
                let user_id = scope.user_id.to_string();
                let agent_name = scope.agent_name.to_string();

                tokio::spawn(async move {
                    let started = Instant::now();
                    let input = match repair_json(&call.arguments) {
                        Ok(input) => input,
                        Err(e) => return ToolCallResult::failure(&call, e, 0),
                    };

                    let invocation = ToolInvocation {
                        tool_name: call.name.clone(),
                        input,
                        tenant_id,
                        user_id,
                        agent_name,
                        timeout,
                    };

                    let outcome = tokio::time::timeout(timeout, registry.execute(invocation)).await;
                    let elapsed = started.elapsed().as_millis() as u64;
                    match outcome {
                        Ok(Ok(output)) => ToolCallResult::success(&call, &output, elapsed),
                        Ok(Err(e)) => ToolCallResult::failure(&call, e.to_string(), elapsed),
                        Err(_) => ToolCallResult::failure(
                            &call,
                            format!("tool '{}' timed out after {}s", call.name, timeout.as_secs()),
                            elapsed,
                        ),
                    }
                })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(calls)
            .map(|(joined, call)| {
                joined.unwrap_or_else(|e| {
                    ToolCallResult::failure(call, format!("tool task aborted: {}", e), 0)
                })
            })
            .collect()
    }
}
