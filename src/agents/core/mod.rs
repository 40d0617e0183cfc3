//! Agent implementation
//!
//! A single [`RoleAgent`] serves every role; roles differ only in their
//! [`RoleStrategy`] (default prompt, role fields, tool eligibility, memory
//! search).

mod executor;
mod memory;
mod prompt;
mod roles;

pub use executor::{Agent, RoleAgent};
pub use memory::{LongTermMemory, MemoryHit, RETRIEVED_MEMORY_KEY};
pub use prompt::render_template;
pub use roles::RoleStrategy;
