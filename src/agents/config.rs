//! Configuration types for agents

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use super::domain::{AgentInfo, AgentType};
use super::error::{AgentError, AgentResult};

/// Tenant-scoped configuration for one agent
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Unique agent id within the tenant
    pub id: String,
    /// Owning tenant
    #[serde(default)]
    pub tenant_id: String,
    /// Human-readable name
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Role of the agent
    #[serde(default)]
    pub agent_type: AgentType,
    /// Primary model identifier
    pub model: String,
    /// Model used when the primary cannot be resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_model: Option<String>,
    /// Model used for background session summaries (defaults to `model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_model: Option<String>,
    /// Literal system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Tera template for the system prompt, rendered with the input variables.
    /// Takes precedence over `system_prompt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Tool names the agent may call
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Knowledge retrieval settings
    #[serde(default)]
    pub rag: RagConfig,
    /// Free-form role-specific configuration
    #[serde(default)]
    pub extra: HashMap<String, Value>,
    /// Timeout for one execution in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_timeout() -> u64 {
    120
}

impl AgentConfig {
    /// Minimal config for a role; remaining fields take their defaults
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        agent_type: AgentType,
        model: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            tenant_id: tenant_id.into(),
            description: String::new(),
            agent_type,
            model: model.into(),
            secondary_model: None,
            summary_model: None,
            system_prompt: None,
            prompt_template: None,
            temperature: None,
            max_tokens: None,
            allowed_tools: Vec::new(),
            rag: RagConfig::default(),
            extra: HashMap::new(),
            timeout_seconds: default_timeout(),
            created_at: Utc::now(),
        }
    }

    /// Model used for summarization
    pub fn summary_model(&self) -> &str {
        self.summary_model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.model)
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            id: self.id.clone(),
            tenant_id: self.tenant_id.clone(),
            name: self.name.clone(),
            agent_type: self.agent_type,
            model: self.model.clone(),
            allowed_tools: self.allowed_tools.clone(),
            rag_enabled: self.rag.enabled,
        }
    }
}

/// Agent-level knowledge retrieval settings
///
/// Unset fields fall back to the runtime defaults; per-call parameters
/// override whatever is set here.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RagConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,
    /// "none", "stuff" or "map_reduce"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_reduce_max_chunks: Option<usize>,
}

/// Read access to agent configuration storage
#[async_trait]
pub trait AgentConfigStore: Send + Sync {
    /// Load one agent config
    async fn get(&self, tenant_id: &str, agent_id: &str) -> AgentResult<AgentConfig>;

    /// Most recently created config of a role
    async fn latest_by_type(&self, tenant_id: &str, agent_type: AgentType) -> AgentResult<AgentConfig>;
}

/// In-memory config store, typically seeded from [`crate::config::Settings::agents`]
#[derive(Default)]
pub struct InMemoryAgentConfigStore {
    configs: RwLock<HashMap<(String, String), AgentConfig>>,
}

impl InMemoryAgentConfigStore {
    pub fn new(configs: Vec<AgentConfig>) -> Self {
        let map = configs
            .into_iter()
            .map(|c| ((c.tenant_id.clone(), c.id.clone()), c))
            .collect();
        Self {
            configs: RwLock::new(map),
        }
    }

    /// Insert or replace a config
    pub async fn upsert(&self, config: AgentConfig) {
        self.configs
            .write()
            .await
            .insert((config.tenant_id.clone(), config.id.clone()), config);
    }

    pub async fn remove(&self, tenant_id: &str, agent_id: &str) -> Option<AgentConfig> {
        self.configs
            .write()
            .await
            .remove(&(tenant_id.to_string(), agent_id.to_string()))
    }
}

#[async_trait]
impl AgentConfigStore for InMemoryAgentConfigStore {
    async fn get(&self, tenant_id: &str, agent_id: &str) -> AgentResult<AgentConfig> {
        self.configs
            .read()
            .await
            .get(&(tenant_id.to_string(), agent_id.to_string()))
            .cloned()
            .ok_or_else(|| AgentError::NotFound(format!("{}/{}", tenant_id, agent_id)))
    }

    async fn latest_by_type(&self, tenant_id: &str, agent_type: AgentType) -> AgentResult<AgentConfig> {
        self.configs
            .read()
            .await
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.agent_type == agent_type)
            .max_by_key(|c| c.created_at)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(format!("{}/{}", tenant_id, agent_type)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: AgentConfig = serde_json::from_value(serde_json::json!({
            "id": "w1",
            "name": "Writer",
            "agent_type": "writer",
            "model": "gpt-4o"
        }))
        .unwrap();

        assert_eq!(config.timeout_seconds, 120);
        assert!(!config.rag.enabled);
        assert_eq!(config.summary_model(), "gpt-4o");
    }

    #[tokio::test]
    async fn test_latest_by_type_picks_newest() {
        let mut older = AgentConfig::new("p-old", "t1", AgentType::Planner, "m");
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = AgentConfig::new("p-new", "t1", AgentType::Planner, "m");
        let other_tenant = AgentConfig::new("p-x", "t2", AgentType::Planner, "m");

        let store = InMemoryAgentConfigStore::new(vec![older, newer, other_tenant]);
        let found = store.latest_by_type("t1", AgentType::Planner).await.unwrap();
        assert_eq!(found.id, "p-new");

        let missing = store.latest_by_type("t1", AgentType::Writer).await;
        assert!(matches!(missing, Err(AgentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_is_tenant_scoped() {
        let store = InMemoryAgentConfigStore::new(vec![AgentConfig::new(
            "a",
            "t1",
            AgentType::Writer,
            "m",
        )]);
        assert!(store.get("t1", "a").await.is_ok());
        assert!(store.get("t2", "a").await.unwrap_err().is_not_found());
    }
}
