use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub mod validator;

use crate::agents::config::AgentConfig;
use crate::agents::llm::PricingTable;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Default `tracing` filter level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub context: ContextSettings,
    #[serde(default)]
    pub tools: ToolSettings,
    #[serde(default)]
    pub rag: RagSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub background: BackgroundSettings,
    #[serde(default)]
    pub pricing: PricingTable,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            context: ContextSettings::default(),
            tools: ToolSettings::default(),
            rag: RagSettings::default(),
            queue: QueueSettings::default(),
            background: BackgroundSettings::default(),
            pricing: PricingTable::default(),
            agents: Vec::new(),
        }
    }
}

/// Session storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStoreKind {
    #[default]
    Memory,
    /// Expiring key-value store
    Ttl,
}

/// Token counting backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    #[default]
    Tiktoken,
    /// chars / 4 estimate
    Approximate,
}

/// Session history, compression and summarization settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Default history window; 0 keeps the full history
    pub history_limit: usize,
    /// Default token budget for history; 0 disables token trimming
    pub history_max_tokens: usize,
    /// History token count that triggers compression
    pub compression_threshold: usize,
    /// Minimum history length before a rolling summary is computed
    pub summary_trigger_messages: usize,
    /// New messages needed since the last summary
    pub summary_min_delta: usize,
    pub summary_timeout_seconds: u64,
    pub session_ttl_seconds: u64,
    pub store: SessionStoreKind,
    pub tokenizer: TokenizerKind,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            history_limit: 20,
            history_max_tokens: 0,
            compression_threshold: 4000,
            summary_trigger_messages: 30,
            summary_min_delta: 6,
            summary_timeout_seconds: 10,
            session_ttl_seconds: 86_400,
            store: SessionStoreKind::default(),
            tokenizer: TokenizerKind::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Maximum model/tool rounds per execution
    pub max_rounds: u32,
    pub call_timeout_seconds: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            call_timeout_seconds: 30,
        }
    }
}

/// Built-in knowledge retrieval defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RagSettings {
    /// "none", "stuff" or "map_reduce"
    pub mode: String,
    pub top_k: usize,
    pub min_score: f32,
    pub map_reduce_max_chunks: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            mode: "stuff".to_string(),
            top_k: 3,
            min_score: 0.7,
            map_reduce_max_chunks: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Worker pool size
    pub concurrency: usize,
    /// How long a finished task is retained, in seconds
    pub retention_seconds: u64,
    /// Deadline for one queued execution, in seconds
    pub task_timeout_seconds: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            retention_seconds: 86_400,
            task_timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackgroundSettings {
    /// Upper bound on concurrently running detached tasks
    pub max_concurrent: usize,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self { max_concurrent: 16 }
    }
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_root(".")
    }

    /// Load `<root>/agentry.{toml,yaml,json}`, then `AGENTRY__*` environment
    /// overrides, then agent definitions under `<root>/config/agents`.
    pub fn from_root(root: &str) -> Result<Self, anyhow::Error> {
        let config_path = std::path::Path::new(root).join("agentry");
        let s = Config::builder()
            .add_source(File::from(config_path).required(false))
            .add_source(
                Environment::with_prefix("AGENTRY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = s.try_deserialize()?;

        settings.load_agents_from_dir(&format!("{}/config/agents", root))?;

        validator::ConfigValidator::validate(&settings).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })?;

        Ok(settings)
    }

    fn load_agents_from_dir(&mut self, path: &str) -> Result<(), anyhow::Error> {
        let pattern = format!("{}/*", path);
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) => {
                    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                        if matches!(ext, "json" | "yaml" | "yml" | "toml") {
                            let content = std::fs::read_to_string(&path)?;
                            let agent: AgentConfig = match ext {
                                "json" => serde_json::from_str(&content)?,
                                "toml" => toml::from_str(&content)?,
                                _ => serde_yaml::from_str(&content)?,
                            };
                            tracing::debug!(agent_id = %agent.id, path = %path.display(), "Loaded agent config");
                            self.agents.push(agent);
                        }
                    }
                }
                Err(e) => tracing::warn!("Failed to read glob entry: {}", e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.context.history_limit, 20);
        assert_eq!(settings.context.compression_threshold, 4000);
        assert_eq!(settings.tools.max_rounds, 5);
        assert_eq!(settings.rag.top_k, 3);
        assert_eq!(settings.queue.concurrency, 10);
        assert_eq!(settings.background.max_concurrent, 16);
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [context]
            history_limit = 8
            store = "ttl"
            "#,
        )
        .unwrap();
        assert_eq!(settings.context.history_limit, 8);
        assert_eq!(settings.context.store, SessionStoreKind::Ttl);
        assert_eq!(settings.context.summary_trigger_messages, 30);
        assert_eq!(settings.log_level, "info");
    }
}
