//! # Agentry - Agent Execution Runtime
//!
//! Agentry runs configurable LLM role agents on behalf of many tenants,
//! enriching every call with conversation history, retrieved knowledge and
//! tool results while keeping history size and cost bounded.
//!
//! ## Features
//!
//! - **Role agents**: writer, reviewer, planner, translator, analyzer,
//!   researcher, formatter, world builder and plot designer
//! - **Session memory**: history trimming, compression and rolling summaries
//! - **Tool loop**: bounded rounds, parallel calls, tolerant argument repair
//! - **Knowledge enrichment**: stuff and map-reduce modes
//! - **Queued execution**: worker pool over a pluggable task queue
//! - **Metrics**: Prometheus counters and histograms per role and tenant
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentry::agents::domain::{AgentContext, AgentInput};
//! use agentry::agents::llm::ModelProvider;
//! use agentry::agents::Registry;
//! use agentry::config::Settings;
//! use std::sync::Arc;
//!
//! async fn run(provider: Arc<dyn ModelProvider>) -> anyhow::Result<()> {
//!     let settings = Settings::new()?;
//!     agentry::telemetry::init_tracing(&settings.log_level);
//!
//!     let registry = Registry::from_settings(&settings, provider)?;
//!     let input = AgentInput::new("Draft a product blurb", AgentContext::new("acme", "u-1"))
//!         .with_session("s-1");
//!     let response = registry.execute("acme", "writer", input).await?;
//!     println!("{}", response.output);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Agents**: runtime core (context, tools, knowledge, registry, queue)
//! - **Config**: layered settings and validation
//! - **Telemetry**: tracing setup

pub mod agents;
pub mod config;
pub mod telemetry;
