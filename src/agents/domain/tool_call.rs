//! Tool call types for agent interactions

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool being called
    pub name: String,
    /// Raw argument JSON as produced by the model (may be malformed)
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Generate a unique ID for a tool call
    pub fn generate_id() -> String {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        format!("call_{}", &raw[..24])
    }
}

/// Result of executing one tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// ID of the tool call this is responding to
    pub tool_call_id: String,
    /// Name of the tool that was called
    pub tool_name: String,
    /// Text fed back to the model (tool output or error description)
    pub content: String,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
    /// Whether the tool execution succeeded
    pub success: bool,
}

impl ToolCallResult {
    /// Create a successful tool call result
    pub fn success(call: &ToolCall, output: &Value, execution_time_ms: u64) -> Self {
        let content = match output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content,
            execution_time_ms,
            success: true,
        }
    }

    /// Create a failed tool call result
    pub fn failure(call: &ToolCall, error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: format!("error: {}", error.into()),
            execution_time_ms,
            success: false,
        }
    }
}

/// Lifecycle state of a registered tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    #[default]
    Active,
    Inactive,
}

/// Definition of a tool available to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema defining the tool's parameters
    pub parameters: Value,
    #[serde(default)]
    pub status: ToolStatus,
}

impl ToolDefinition {
    /// Create a new, active tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            status: ToolStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ToolStatus::Active
    }
}
