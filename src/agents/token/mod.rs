//! Token counting

mod counter;

pub use counter::{CharRatioCounter, TiktokenCounter, Tokenizer, MESSAGE_OVERHEAD_TOKENS};
