//! Queued task payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::agents::domain::{AgentContext, AgentInput};
use crate::agents::error::{AgentError, AgentResult};

/// Task type of a queued agent execution
pub const AGENT_RUN_TASK: &str = "agent:run";

/// Everything a worker needs to replay one agent execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunTask {
    pub task_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub agent_id: String,
    pub input: String,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub context_data: HashMap<String, Value>,
    #[serde(default)]
    pub extra_params: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl AgentRunTask {
    pub fn new(
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        agent_id: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            agent_id: agent_id.into(),
            input: input.into(),
            variables: HashMap::new(),
            context_data: HashMap::new(),
            extra_params: HashMap::new(),
            session_id: None,
            trace_id: None,
        }
    }

    /// Capture a prepared input for later execution
    pub fn from_input(agent_id: impl Into<String>, input: &AgentInput) -> Self {
        let context = &input.context;
        Self {
            variables: input.variables.clone(),
            context_data: context.data.clone(),
            extra_params: input.extra_params.clone(),
            session_id: context.session_id.clone(),
            trace_id: context.trace_id.clone(),
            ..Self::new(
                context.tenant_id.clone(),
                context.user_id.clone(),
                agent_id,
                input.content.clone(),
            )
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// Rebuild the agent input on the worker side
    pub fn to_input(&self) -> AgentInput {
        let context = AgentContext {
            tenant_id: self.tenant_id.clone(),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            trace_id: self.trace_id.clone(),
            data: self.context_data.clone(),
            ..Default::default()
        };
        AgentInput {
            content: self.input.clone(),
            variables: self.variables.clone(),
            history: Vec::new(),
            extra_params: self.extra_params.clone(),
            context,
        }
    }
}

/// A serialized task with its queueing policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task_id: String,
    pub task_type: String,
    pub payload: Value,
    /// How long the transport keeps the finished task, in seconds
    pub retention_seconds: u64,
    /// Deadline for processing, in seconds
    pub timeout_seconds: u64,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskEnvelope {
    pub fn agent_run(
        task: &AgentRunTask,
        retention_seconds: u64,
        timeout_seconds: u64,
    ) -> AgentResult<Self> {
        let payload =
            serde_json::to_value(task).map_err(|e| AgentError::Serialization(e.to_string()))?;
        Ok(Self {
            task_id: task.task_id.clone(),
            task_type: AGENT_RUN_TASK.to_string(),
            payload,
            retention_seconds,
            timeout_seconds,
            enqueued_at: Utc::now(),
        })
    }

    pub fn decode_agent_run(&self) -> AgentResult<AgentRunTask> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| AgentError::Serialization(format!("bad {} payload: {}", AGENT_RUN_TASK, e)))
    }
}
