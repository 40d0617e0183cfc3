//! Run log side-channel
//!
//! The registry reports each execution here. Writes are best effort: a
//! failing log never changes the outcome of the execution it describes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::agents::domain::{AgentResponse, ExecutionStatus, TokenUsage};
use crate::agents::error::{AgentError, AgentResult};

/// A run as it starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    pub input: String,
    pub started_at: DateTime<Utc>,
}

/// Terminal state of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunUpdate {
    pub run_id: String,
    pub status: ExecutionStatus,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub usage: TokenUsage,
    pub cost: f64,
    pub latency_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl RunUpdate {
    pub fn from_response(run_id: impl Into<String>, response: &AgentResponse) -> Self {
        Self {
            run_id: run_id.into(),
            status: response.status,
            output: response.output.clone(),
            error: response.error.clone(),
            usage: response.usage,
            cost: response.cost,
            latency_ms: response.latency_ms,
            finished_at: Utc::now(),
        }
    }
}

/// One step inside a run (history compression, the agent call)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub run_id: String,
    pub name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub latency_ms: u64,
}

#[async_trait]
pub trait RunLog: Send + Sync {
    async fn start_run(&self, record: RunRecord) -> AgentResult<()>;

    async fn record_step(&self, step: StepRecord) -> AgentResult<()>;

    async fn finish_run(&self, update: RunUpdate) -> AgentResult<()>;
}

/// Run log kept in memory, newest last
#[derive(Default, Clone)]
pub struct InMemoryRunLog {
    runs: Arc<RwLock<Vec<(RunRecord, Option<RunUpdate>)>>>,
    steps: Arc<RwLock<Vec<StepRecord>>>,
}

impl InMemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn runs(&self) -> Vec<(RunRecord, Option<RunUpdate>)> {
        self.runs.read().await.clone()
    }

    pub async fn steps(&self, run_id: &str) -> Vec<StepRecord> {
        self.steps
            .read()
            .await
            .iter()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RunLog for InMemoryRunLog {
    async fn start_run(&self, record: RunRecord) -> AgentResult<()> {
        self.runs.write().await.push((record, None));
        Ok(())
    }

    async fn record_step(&self, step: StepRecord) -> AgentResult<()> {
        self.steps.write().await.push(step);
        Ok(())
    }

    async fn finish_run(&self, update: RunUpdate) -> AgentResult<()> {
        let mut runs = self.runs.write().await;
        match runs.iter_mut().find(|(r, _)| r.run_id == update.run_id) {
            Some(entry) => {
                entry.1 = Some(update);
                Ok(())
            }
            None => Err(AgentError::NotFound(format!("run {}", update.run_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(run_id: &str) -> RunRecord {
        RunRecord {
            run_id: run_id.to_string(),
            tenant_id: "t1".into(),
            user_id: "u1".into(),
            agent_id: "a1".into(),
            session_id: None,
            trace_id: Some("trace".into()),
            input: "hello".into(),
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_start_and_finish() {
        let log = InMemoryRunLog::new();
        log.start_run(record("r1")).await.unwrap();

        let response = AgentResponse::success("done", TokenUsage::new(3, 4), 9);
        log.finish_run(RunUpdate::from_response("r1", &response))
            .await
            .unwrap();

        let runs = log.runs().await;
        assert_eq!(runs.len(), 1);
        let update = runs[0].1.as_ref().unwrap();
        assert_eq!(update.status, ExecutionStatus::Success);
        assert_eq!(update.usage.total_tokens, 7);
    }

    #[tokio::test]
    async fn test_finish_unknown_run_fails() {
        let log = InMemoryRunLog::new();
        let response = AgentResponse::failed("x", 1);
        assert!(log
            .finish_run(RunUpdate::from_response("missing", &response))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_steps_filtered_by_run() {
        let log = InMemoryRunLog::new();
        for run_id in ["r1", "r2", "r1"] {
            log.record_step(StepRecord {
                run_id: run_id.into(),
                name: "agent".into(),
                success: true,
                detail: None,
                latency_ms: 1,
            })
            .await
            .unwrap();
        }
        assert_eq!(log.steps("r1").await.len(), 2);
    }
}
