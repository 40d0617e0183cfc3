//! Worker pool replaying queued agent runs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Semaphore};

use super::task::{TaskEnvelope, AGENT_RUN_TASK};
use super::transport::TaskQueue;
use crate::agents::domain::AgentResponse;
use crate::agents::registry::Registry;
use crate::config::QueueSettings;

const DEQUEUE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Result of one processed task
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: String,
    pub agent_id: String,
    /// The agent's response, or why the task produced none
    pub result: Result<AgentResponse, String>,
}

/// Pulls tasks off a [`TaskQueue`] and runs them through the [`Registry`]
/// with bounded concurrency
#[derive(Clone)]
pub struct WorkerPool {
    queue: Arc<dyn TaskQueue>,
    registry: Registry,
    concurrency: usize,
    outcomes: Option<mpsc::Sender<TaskOutcome>>,
}

impl WorkerPool {
    pub fn new(queue: Arc<dyn TaskQueue>, registry: Registry, settings: &QueueSettings) -> Self {
        Self {
            queue,
            registry,
            concurrency: settings.concurrency.max(1),
            outcomes: None,
        }
    }

    /// Report every processed task on `outcomes`
    pub fn with_outcomes(mut self, outcomes: mpsc::Sender<TaskOutcome>) -> Self {
        self.outcomes = Some(outcomes);
        self
    }

    /// Process tasks until `shutdown` flips to true (or its sender is
    /// dropped) or the queue closes. In-flight tasks finish before this
    /// returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        tracing::info!(concurrency = self.concurrency, "Worker pool started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let envelope = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = self.queue.dequeue() => match next {
                    Ok(Some(envelope)) => envelope,
                    Ok(None) => {
                        tracing::info!("Task queue closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to dequeue task");
                        tokio::time::sleep(DEQUEUE_RETRY_DELAY).await;
                        continue;
                    }
                },
            };

            let worker = self.clone();
            tokio::spawn(async move {
                let _permit = permit;
                worker.handle(envelope).await;
            });
        }

        // Wait for in-flight tasks
        let _ = semaphore.acquire_many(self.concurrency as u32).await;
        tracing::info!("Worker pool stopped");
    }

    async fn handle(&self, envelope: TaskEnvelope) {
        match envelope.task_type.as_str() {
            AGENT_RUN_TASK => self.run_agent(envelope).await,
            other => {
                tracing::warn!(task_id = %envelope.task_id, task_type = other, "Dropping task of unknown type");
            }
        }
    }

    async fn run_agent(&self, envelope: TaskEnvelope) {
        let task = match envelope.decode_agent_run() {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(task_id = %envelope.task_id, error = %e, "Undecodable agent run");
                self.report(TaskOutcome {
                    task_id: envelope.task_id.clone(),
                    agent_id: String::new(),
                    result: Err(e.to_string()),
                })
                .await;
                return;
            }
        };

        tracing::debug!(
            task_id = %task.task_id,
            tenant_id = %task.tenant_id,
            agent_id = %task.agent_id,
            "Running queued agent"
        );

        let timeout = Duration::from_secs(envelope.timeout_seconds.max(1));
        let execution = self
            .registry
            .execute(&task.tenant_id, &task.agent_id, task.to_input());
        let result = match tokio::time::timeout(timeout, execution).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                tracing::warn!(task_id = %task.task_id, agent_id = %task.agent_id, error = %e, "Queued agent run failed");
                Err(e.to_string())
            }
            Err(_) => {
                tracing::warn!(task_id = %task.task_id, timeout_secs = envelope.timeout_seconds, "Queued agent run timed out");
                Err(format!("timed out after {}s", envelope.timeout_seconds))
            }
        };

        self.report(TaskOutcome {
            task_id: task.task_id,
            agent_id: task.agent_id,
            result,
        })
        .await;
    }

    async fn report(&self, outcome: TaskOutcome) {
        if let Some(outcomes) = &self.outcomes {
            if outcomes.send(outcome).await.is_err() {
                tracing::debug!("Outcome receiver dropped");
            }
        }
    }
}
