//! Model client capability
//!
//! The runtime never talks to a provider wire protocol directly. Concrete
//! backends (OpenAI, Anthropic, Gemini, Azure, Ollama, ...) implement
//! [`ModelClient`] and are resolved per tenant through [`ModelProvider`].

mod pricing;
mod stream;

pub use pricing::*;
pub use stream::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agents::domain::{Message, TokenUsage, ToolCall, ToolDefinition};
use crate::agents::error::LlmResult;

/// Trait for one chat/completion/embedding backend
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Get the model being used
    fn model(&self) -> &str;

    /// Per-model pricing reported by the backend, when it knows it
    fn pricing(&self) -> Option<ModelPricing> {
        None
    }

    /// Complete a request (non-streaming)
    async fn chat_completion(&self, request: ChatRequest) -> LlmResult<ChatResponse>;

    /// Complete a request with streaming
    fn chat_completion_stream(&self, request: ChatRequest) -> LlmStream;

    /// Embed one or more inputs
    async fn embedding(&self, request: EmbeddingRequest) -> LlmResult<EmbeddingResponse>;
}

/// Resolves the model client for a tenant + model pair
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn get_client(&self, tenant_id: &str, model_id: &str) -> LlmResult<Arc<dyn ModelClient>>;
}

/// Request for chat completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Model to use (overrides client default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Temperature for sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Tools available for calling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool choice mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    /// Plain request without tools
    pub fn new(messages: Vec<Message>, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        Self {
            messages,
            temperature,
            max_tokens,
            ..Default::default()
        }
    }
}

/// Tool choice mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Let the model decide
    Auto,
    /// Don't use tools
    None,
    /// Must use a tool
    Required,
    /// Use a specific tool
    Tool { name: String },
}

/// Response from chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated message
    pub message: Message,
    /// Reason the completion stopped
    pub finish_reason: FinishReason,
    /// Token usage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ChatResponse {
    /// Plain text answer
    pub fn text(content: impl Into<String>, usage: Option<TokenUsage>) -> Self {
        Self {
            message: Message::assistant(content),
            finish_reason: FinishReason::Stop,
            usage,
        }
    }

    /// Answer requesting tool calls
    pub fn with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    ) -> Self {
        Self {
            message: Message::assistant_with_tools(content, tool_calls),
            finish_reason: FinishReason::ToolCalls,
            usage,
        }
    }

    pub fn content(&self) -> &str {
        &self.message.content
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// Reason completion stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop
    Stop,
    /// Hit max tokens
    Length,
    /// Tool call requested
    ToolCalls,
    /// Content filtered
    ContentFilter,
}

/// Request for embeddings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Embedding vectors, one per input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}
