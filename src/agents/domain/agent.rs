//! Agent domain types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

use super::Message;

/// Agent role enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Drafts long-form content
    #[default]
    Writer,
    /// Critiques drafts
    Reviewer,
    /// Breaks work into plans; consults long-term memory
    Planner,
    /// Translates between languages
    Translator,
    /// Produces structured analysis
    Analyzer,
    /// Gathers and summarizes facts
    Researcher,
    /// Reshapes content into a target format
    Formatter,
    /// Designs settings and lore
    WorldBuilder,
    /// Designs story arcs
    PlotDesigner,
}

impl AgentType {
    pub const ALL: [AgentType; 9] = [
        AgentType::Writer,
        AgentType::Reviewer,
        AgentType::Planner,
        AgentType::Translator,
        AgentType::Analyzer,
        AgentType::Researcher,
        AgentType::Formatter,
        AgentType::WorldBuilder,
        AgentType::PlotDesigner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Writer => "writer",
            AgentType::Reviewer => "reviewer",
            AgentType::Planner => "planner",
            AgentType::Translator => "translator",
            AgentType::Analyzer => "analyzer",
            AgentType::Researcher => "researcher",
            AgentType::Formatter => "formatter",
            AgentType::WorldBuilder => "world_builder",
            AgentType::PlotDesigner => "plot_designer",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        AgentType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown agent type: {}", s))
    }
}

/// Per-call execution context
///
/// `data` is the side channel through which enrichment stages (RAG, memory)
/// hand derived text to prompt assembly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentContext {
    pub tenant_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

impl AgentContext {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Read a string value from the data bag
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

/// Input for one agent invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentInput {
    /// The current user turn
    pub content: String,
    /// Variables for prompt template rendering
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    /// Prior turns, oldest first
    #[serde(default)]
    pub history: Vec<Message>,
    /// Free-form per-call parameters
    #[serde(default)]
    pub extra_params: HashMap<String, Value>,
    #[serde(default)]
    pub context: AgentContext,
}

impl AgentInput {
    pub fn new(content: impl Into<String>, context: AgentContext) -> Self {
        Self {
            content: content.into(),
            context,
            ..Default::default()
        }
    }

    /// Attach a session id to the execution context
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.context.session_id = Some(session_id.into());
        self
    }

    /// Set one extra parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// Set one template variable
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.context.session_id.as_deref().filter(|s| !s.is_empty())
    }
}

/// Agent information returned from list/get operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub agent_type: AgentType,
    pub model: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,
    pub rag_enabled: bool,
}
