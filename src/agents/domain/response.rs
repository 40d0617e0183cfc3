//! Agent response and streaming types

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::agents::error::AgentError;

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens used in the prompt/input
    pub prompt_tokens: u32,
    /// Tokens generated in the response
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Add another usage record into this one
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Terminal status of an agent execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Partial,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Final response from an agent execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Output text
    pub output: String,
    /// Optional structured output (parsed when the model answered with JSON)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<Value>,
    #[serde(default)]
    pub usage: TokenUsage,
    /// Estimated cost in USD
    #[serde(default)]
    pub cost: f64,
    /// Execution time in milliseconds
    pub latency_ms: u64,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Model that produced the output
    #[serde(default)]
    pub model: String,
}

impl AgentResponse {
    /// Successful response
    pub fn success(output: impl Into<String>, usage: TokenUsage, latency_ms: u64) -> Self {
        let output = output.into();
        let structured_output = parse_structured(&output);
        Self {
            output,
            structured_output,
            usage,
            cost: 0.0,
            latency_ms,
            status: ExecutionStatus::Success,
            error: None,
            model: String::new(),
        }
    }

    /// Failed response carrying a human-readable error
    pub fn failed(error: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            output: String::new(),
            structured_output: None,
            usage: TokenUsage::default(),
            cost: 0.0,
            latency_ms,
            status: ExecutionStatus::Failed,
            error: Some(error.into()),
            model: String::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Parse output as JSON when it is a JSON object or array, tolerating a code fence
fn parse_structured(output: &str) -> Option<Value> {
    let trimmed = output.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);
    if !(body.starts_with('{') || body.starts_with('[')) {
        return None;
    }
    serde_json::from_str(body).ok()
}

/// A chunk of streaming output from an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentChunk {
    /// Streamed text content
    Text { content: String },
    /// Token usage update
    Usage { usage: TokenUsage },
    /// Terminal marker carrying the assembled response
    Done { response: AgentResponse },
}

impl AgentChunk {
    /// Create a text chunk
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Create a done marker
    pub fn done(response: AgentResponse) -> Self {
        Self::Done { response }
    }
}

/// Streaming response from an agent
///
/// Yields text chunks and ends with [`AgentChunk::Done`]. Errors arrive as
/// `Err` items; the stream is finite and cannot be restarted.
pub struct AgentStream {
    receiver: mpsc::Receiver<Result<AgentChunk, AgentError>>,
}

impl AgentStream {
    /// Create a channel pair for building an agent stream
    pub fn channel(buffer: usize) -> (AgentStreamSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (AgentStreamSender { sender: tx }, Self { receiver: rx })
    }

    /// Stream that yields a single error and ends
    pub fn from_error(error: AgentError) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // capacity 1 and a fresh channel: try_send cannot fail
        let _ = tx.try_send(Err(error));
        Self { receiver: rx }
    }

    /// Drain the stream into the final response
    pub async fn collect(mut self) -> Result<AgentResponse, AgentError> {
        let mut text = String::new();
        let mut usage = TokenUsage::default();

        while let Some(item) = self.receiver.recv().await {
            match item? {
                AgentChunk::Text { content } => text.push_str(&content),
                AgentChunk::Usage { usage: u } => usage = u,
                AgentChunk::Done { response } => return Ok(response),
            }
        }

        // Producer ended without a done marker
        Ok(AgentResponse {
            status: ExecutionStatus::Partial,
            ..AgentResponse::success(text, usage, 0)
        })
    }
}

impl Stream for AgentStream {
    type Item = Result<AgentChunk, AgentError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Sender half for building an agent stream
#[derive(Clone)]
pub struct AgentStreamSender {
    sender: mpsc::Sender<Result<AgentChunk, AgentError>>,
}

impl AgentStreamSender {
    /// Send a chunk
    pub async fn send(
        &self,
        chunk: AgentChunk,
    ) -> Result<(), mpsc::error::SendError<Result<AgentChunk, AgentError>>> {
        self.sender.send(Ok(chunk)).await
    }

    /// Send an error
    pub async fn send_error(
        &self,
        error: AgentError,
    ) -> Result<(), mpsc::error::SendError<Result<AgentChunk, AgentError>>> {
        self.sender.send(Err(error)).await
    }

    /// Check if the receiver is closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_output_detected() {
        let resp = AgentResponse::success("```json\n{\"a\": 1}\n```", TokenUsage::default(), 3);
        assert_eq!(resp.structured_output, Some(serde_json::json!({"a": 1})));

        let plain = AgentResponse::success("just text", TokenUsage::default(), 3);
        assert!(plain.structured_output.is_none());
    }

    #[test]
    fn test_usage_saturates_instead_of_overflowing() {
        let huge = TokenUsage::new(u32::MAX, 10);
        assert_eq!(huge.total_tokens, u32::MAX);

        let mut total = TokenUsage::new(5, 5);
        total.accumulate(&huge);
        total.accumulate(&huge);
        assert_eq!(total.prompt_tokens, u32::MAX);
        assert_eq!(total.completion_tokens, 25);
        assert_eq!(total.total_tokens, u32::MAX);
    }

    #[tokio::test]
    async fn test_collect_returns_done_response() {
        let (sender, stream) = AgentStream::channel(8);
        tokio::spawn(async move {
            let _ = sender.send(AgentChunk::text("hel")).await;
            let _ = sender.send(AgentChunk::text("lo")).await;
            let _ = sender
                .send(AgentChunk::done(AgentResponse::success(
                    "hello",
                    TokenUsage::new(1, 2),
                    5,
                )))
                .await;
        });

        let response = stream.collect().await.unwrap();
        assert_eq!(response.output, "hello");
        assert_eq!(response.usage.total_tokens, 3);
    }

    #[tokio::test]
    async fn test_collect_without_done_is_partial() {
        let (sender, stream) = AgentStream::channel(8);
        tokio::spawn(async move {
            let _ = sender.send(AgentChunk::text("cut")).await;
        });

        let response = stream.collect().await.unwrap();
        assert_eq!(response.status, ExecutionStatus::Partial);
        assert_eq!(response.output, "cut");
    }

    #[tokio::test]
    async fn test_error_stream() {
        let stream = AgentStream::from_error(AgentError::NotFound("a".into()));
        assert!(stream.collect().await.is_err());
    }
}
