//! Error types for the agent runtime

use thiserror::Error;

/// Errors that can occur during agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent configuration not found
    #[error("Agent not found: {0}")]
    NotFound(String),

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session exists but the requested data key does not
    #[error("Session data key '{key}' not found in session {session_id}")]
    DataKeyNotFound { session_id: String, key: String },

    /// Tool definition not found or inactive
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Session store error
    #[error("Memory error: {0}")]
    Memory(String),

    /// Execution error
    #[error("Execution error: {0}")]
    Execution(String),

    /// Tool loop ran out of rounds
    #[error("exceeded maximum tool rounds ({0})")]
    MaxToolRounds(u32),

    /// Timeout
    #[error("Operation timed out after {0}s")]
    Timeout(u64),

    /// Knowledge retrieval error
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Task queue error
    #[error("Queue error: {0}")]
    Queue(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Whether this error is one of the "not found" conditions
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AgentError::NotFound(_)
                | AgentError::SessionNotFound(_)
                | AgentError::DataKeyNotFound { .. }
                | AgentError::ToolNotFound(_)
        )
    }
}

/// Errors specific to LLM provider operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider not found
    #[error("LLM provider not found: {0}")]
    ProviderNotFound(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// API error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication error
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Streaming error
    #[error("Streaming error: {0}")]
    Streaming(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Token limit exceeded
    #[error("Token limit exceeded: {tokens} tokens exceeds model limit of {limit}")]
    TokenLimitExceeded { tokens: u32, limit: u32 },

    /// Content filtered
    #[error("Content filtered by safety system")]
    ContentFiltered,

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Timeout
    #[error("Request timed out")]
    Timeout,
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Serialization(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for LlmError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        LlmError::Timeout
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(AgentError::SessionNotFound("s1".into()).is_not_found());
        assert!(AgentError::DataKeyNotFound {
            session_id: "s1".into(),
            key: "k".into()
        }
        .is_not_found());
        assert!(!AgentError::MaxToolRounds(5).is_not_found());
    }

    #[test]
    fn test_round_limit_message() {
        let err = AgentError::MaxToolRounds(5);
        assert_eq!(err.to_string(), "exceeded maximum tool rounds (5)");
    }
}
