//! Submission side of asynchronous execution

use std::sync::Arc;

use super::task::{AgentRunTask, TaskEnvelope};
use super::transport::TaskQueue;
use crate::agents::error::AgentResult;
use crate::config::QueueSettings;

/// Serializes agent runs onto a [`TaskQueue`]
#[derive(Clone)]
pub struct QueueClient {
    queue: Arc<dyn TaskQueue>,
    retention_seconds: u64,
    timeout_seconds: u64,
}

impl QueueClient {
    pub fn new(queue: Arc<dyn TaskQueue>, settings: &QueueSettings) -> Self {
        Self {
            queue,
            retention_seconds: settings.retention_seconds,
            timeout_seconds: settings.task_timeout_seconds,
        }
    }

    /// Enqueue with the configured retention and timeout; returns the task id
    pub async fn submit(&self, task: AgentRunTask) -> AgentResult<String> {
        self.submit_with(task, self.retention_seconds, self.timeout_seconds)
            .await
    }

    pub async fn submit_with(
        &self,
        task: AgentRunTask,
        retention_seconds: u64,
        timeout_seconds: u64,
    ) -> AgentResult<String> {
        let envelope = TaskEnvelope::agent_run(&task, retention_seconds, timeout_seconds)?;
        self.queue.enqueue(envelope).await?;

        tracing::debug!(
            task_id = %task.task_id,
            tenant_id = %task.tenant_id,
            agent_id = %task.agent_id,
            "Enqueued agent run"
        );
        Ok(task.task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::queue::task::AGENT_RUN_TASK;
    use crate::agents::queue::transport::InMemoryTaskQueue;

    #[tokio::test]
    async fn test_submit_applies_settings() {
        let queue = InMemoryTaskQueue::new();
        let settings = QueueSettings {
            concurrency: 2,
            retention_seconds: 120,
            task_timeout_seconds: 45,
        };
        let client = QueueClient::new(Arc::new(queue.clone()), &settings);

        let task = AgentRunTask::new("t1", "u1", "writer", "hello");
        let expected_id = task.task_id.clone();
        let task_id = client.submit(task).await.unwrap();
        assert_eq!(task_id, expected_id);

        let envelope = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(envelope.task_type, AGENT_RUN_TASK);
        assert_eq!(envelope.retention_seconds, 120);
        assert_eq!(envelope.timeout_seconds, 45);
    }
}
