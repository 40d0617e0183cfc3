//! Tool lookup and execution

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::agents::domain::{ToolDefinition, ToolStatus};
use crate::agents::error::{AgentError, AgentResult};

/// One tool execution request
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool_name: String,
    /// Parsed arguments
    pub input: Value,
    pub tenant_id: String,
    pub user_id: String,
    /// Agent issuing the call
    pub agent_name: String,
    pub timeout: Duration,
}

/// Registry of tools an agent may call
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Active definitions among `names`; unknown or inactive names are skipped
    async fn active_tools(&self, tenant_id: &str, names: &[String]) -> AgentResult<Vec<ToolDefinition>>;

    /// Execute a tool, returning its structured output
    async fn execute(&self, invocation: ToolInvocation) -> AgentResult<Value>;
}

type ToolFn = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

struct RegisteredTool {
    definition: ToolDefinition,
    handler: ToolFn,
}

/// In-process tool registry backed by async closures
#[derive(Default)]
pub struct InMemoryToolRegistry {
    tools: Arc<RwLock<HashMap<String, RegisteredTool>>>,
}

impl InMemoryToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with an async handler
    pub async fn register<F, Fut>(&self, definition: ToolDefinition, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: ToolFn = Arc::new(move |args| Box::pin(handler(args)));
        let mut tools = self.tools.write().await;
        tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                handler,
            },
        );
    }

    /// Register a tool that always answers with `response`
    pub async fn register_static(&self, definition: ToolDefinition, response: Value) {
        self.register(definition, move |_| {
            let response = response.clone();
            async move { Ok(response) }
        })
        .await;
    }

    /// Activate or deactivate a tool; returns false when it is unknown
    pub async fn set_status(&self, name: &str, status: ToolStatus) -> bool {
        let mut tools = self.tools.write().await;
        match tools.get_mut(name) {
            Some(tool) => {
                tool.definition.status = status;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ToolRegistry for InMemoryToolRegistry {
    async fn active_tools(&self, _tenant_id: &str, names: &[String]) -> AgentResult<Vec<ToolDefinition>> {
        let tools = self.tools.read().await;
        Ok(names
            .iter()
            .filter_map(|name| tools.get(name))
            .filter(|t| t.definition.is_active())
            .map(|t| t.definition.clone())
            .collect())
    }

    async fn execute(&self, invocation: ToolInvocation) -> AgentResult<Value> {
        let handler = {
            let tools = self.tools.read().await;
            match tools.get(&invocation.tool_name) {
                Some(tool) if tool.definition.is_active() => tool.handler.clone(),
                _ => return Err(AgentError::ToolNotFound(invocation.tool_name)),
            }
        };

        tracing::debug!(
            tool = %invocation.tool_name,
            tenant_id = %invocation.tenant_id,
            agent = %invocation.agent_name,
            "Executing tool"
        );

        match tokio::time::timeout(invocation.timeout, handler(invocation.input)).await {
            Ok(result) => result.map_err(|e| AgentError::ToolExecution(e.to_string())),
            Err(_) => Err(AgentError::Timeout(invocation.timeout.as_secs())),
        }
    }
}
