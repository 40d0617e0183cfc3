//! Agent execution runtime
//!
//! Runs configurable role agents for many tenants at once:
//! - Role agents (writer, reviewer, planner, ...) sharing one executor
//! - Session history with count and token-budget trimming, compression and
//!   rolling summaries
//! - A bounded tool-calling loop with parallel calls per round
//! - Knowledge enrichment in stuff or map-reduce mode
//! - Queued execution through a worker pool
//!
//! ## Architecture
//!
//! - `domain/` - Core types (Message, Session, AgentInput, AgentResponse)
//! - `llm/` - Model client capability, streaming and pricing
//! - `context/` - Session stores and the context manager
//! - `tools/` - Tool registry capability and the tool loop
//! - `rag/` - Knowledge retrieval helper
//! - `core/` - The role agent executor
//! - `registry` - Agent resolution and the end-to-end execution path
//! - `queue/` - Asynchronous execution wrapper

pub mod background;
pub mod config;
pub mod context;
pub mod core;
pub mod domain;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod params;
pub mod queue;
pub mod rag;
pub mod registry;
pub mod runlog;
pub mod token;
pub mod tools;

// Re-export commonly used types
pub use config::*;
pub use domain::*;
pub use error::*;
pub use registry::Registry;
