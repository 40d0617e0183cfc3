//! Queue transport capability and an in-process implementation

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use super::task::TaskEnvelope;
use crate::agents::error::{AgentError, AgentResult};

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, envelope: TaskEnvelope) -> AgentResult<()>;

    /// Wait for the next task; `None` once the queue is closed and drained
    async fn dequeue(&self) -> AgentResult<Option<TaskEnvelope>>;
}

/// FIFO queue living in this process
#[derive(Clone, Default)]
pub struct InMemoryTaskQueue {
    tasks: Arc<Mutex<VecDeque<TaskEnvelope>>>,
    notify: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Stop accepting tasks; consumers drain what is left
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, envelope: TaskEnvelope) -> AgentResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AgentError::Queue("queue is closed".to_string()));
        }
        self.tasks.lock().await.push_back(envelope);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> AgentResult<Option<TaskEnvelope>> {
        loop {
            let notified = self.notify.notified();
            if let Some(envelope) = self.tasks.lock().await.pop_front() {
                return Ok(Some(envelope));
            }
            if self.closed.load(Ordering::Acquire) {
                return Ok(None);
            }
            notified.await;
        }
    }
}
