use std::collections::HashMap;
use thiserror::Error;

use crate::agents::config::AgentConfig;
use crate::agents::rag::RagMode;
use crate::config::Settings;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_runtime(settings) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_agents(&settings.agents) {
            errors.extend(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_runtime(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if settings.tools.max_rounds == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "tools.max_rounds".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if settings.tools.call_timeout_seconds == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "tools.call_timeout_seconds".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if settings.queue.concurrency == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "queue.concurrency".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if settings.background.max_concurrent == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "background.max_concurrent".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if RagMode::parse(&settings.rag.mode).is_none() {
            errors.push(ValidationError::InvalidValue {
                field: "rag.mode".to_string(),
                reason: format!("Unknown mode '{}'", settings.rag.mode),
            });
        }

        if !(0.0..=1.0).contains(&settings.rag.min_score) {
            errors.push(ValidationError::InvalidValue {
                field: "rag.min_score".to_string(),
                reason: "Must be between 0 and 1".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_agents(agents: &[AgentConfig]) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut seen = HashMap::new();

        for (idx, agent) in agents.iter().enumerate() {
            if let Some(prev_idx) = seen.insert((&agent.tenant_id, &agent.id), idx) {
                errors.push(ValidationError::Duplicate(format!(
                    "Agent '{}' of tenant '{}' appears at indices {} and {}",
                    agent.id, agent.tenant_id, prev_idx, idx
                )));
            }

            if agent.id.is_empty() {
                errors.push(ValidationError::MissingField(format!("agents[{}].id", idx)));
            }

            if agent.model.is_empty() {
                errors.push(ValidationError::MissingField(format!("agents[{}].model", idx)));
            }

            if let Some(temperature) = agent.temperature {
                if !(0.0..=2.0).contains(&temperature) {
                    errors.push(ValidationError::InvalidValue {
                        field: format!("agents[{}].temperature", idx),
                        reason: "Must be between 0 and 2".to_string(),
                    });
                }
            }

            if agent.timeout_seconds == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: format!("agents[{}].timeout_seconds", idx),
                    reason: "Must be greater than 0".to_string(),
                });
            }

            if agent.rag.enabled && agent.rag.knowledge_base_id.as_deref().unwrap_or("").is_empty() {
                errors.push(ValidationError::InvalidValue {
                    field: format!("agents[{}].rag", idx),
                    reason: "RAG is enabled but no knowledge_base_id is set".to_string(),
                });
            }

            if let Some(mode) = &agent.rag.mode {
                if RagMode::parse(mode).is_none() {
                    errors.push(ValidationError::InvalidValue {
                        field: format!("agents[{}].rag.mode", idx),
                        reason: format!("Unknown mode '{}'", mode),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
