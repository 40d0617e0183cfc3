//! Long-term memory capability consulted by the planner

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agents::error::AgentResult;

/// Context data key carrying retrieved memories
pub const RETRIEVED_MEMORY_KEY: &str = "retrieved_memory";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryHit {
    pub content: String,
    pub score: f32,
}

#[async_trait]
pub trait LongTermMemory: Send + Sync {
    /// Memories relevant to `query`, best first
    async fn search(
        &self,
        tenant_id: &str,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> AgentResult<Vec<MemoryHit>>;
}
