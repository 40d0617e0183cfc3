//! Domain types for the agent runtime
//!
//! Core value objects shared by every layer: messages and sessions, agent
//! inputs and results, tool calls.

mod agent;
mod message;
mod response;
mod tool_call;

pub use agent::*;
pub use message::*;
pub use response::*;
pub use tool_call::*;
