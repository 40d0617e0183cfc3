//! Tool calling: registry capability, argument repair and the round loop

mod helper;
mod registry;
mod repair;

pub use helper::{ToolHelper, ToolScope};
pub use registry::{InMemoryToolRegistry, ToolInvocation, ToolRegistry};
pub use repair::repair_json;
