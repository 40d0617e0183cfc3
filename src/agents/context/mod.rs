//! Conversation context: session storage, history trimming and summary memory

mod manager;
mod store;
mod trim;

pub use manager::ContextManager;
pub use store::{InMemorySessionStore, SessionStore, TtlSessionStore};
pub use trim::{limit_messages, trim_to_token_budget};
