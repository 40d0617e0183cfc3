//! Asynchronous agent execution
//!
//! [`QueueClient`] serializes an [`AgentRunTask`] into a [`TaskEnvelope`];
//! a [`WorkerPool`] dequeues envelopes and replays them through
//! `Registry::execute`.

mod client;
mod task;
mod transport;
mod worker;

pub use client::QueueClient;
pub use task::{AgentRunTask, TaskEnvelope, AGENT_RUN_TASK};
pub use transport::{InMemoryTaskQueue, TaskQueue};
pub use worker::{TaskOutcome, WorkerPool};
