//! Token counting utilities

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tiktoken_rs::CoreBPE;

use crate::agents::domain::Message;
use crate::agents::error::{AgentError, AgentResult};

/// Approximate per-message framing cost (role markers, separators)
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Counts tokens in text for a given model
pub trait Tokenizer: Send + Sync {
    fn count(&self, model: &str, text: &str) -> AgentResult<usize>;

    /// Tokens for one message, including framing overhead
    fn count_message(&self, model: &str, message: &Message) -> AgentResult<usize> {
        Ok(self.count(model, &message.content)? + MESSAGE_OVERHEAD_TOKENS)
    }

    /// Tokens for a message list
    fn count_messages(&self, model: &str, messages: &[Message]) -> AgentResult<usize> {
        messages
            .iter()
            .try_fold(0usize, |acc, m| Ok(acc + self.count_message(model, m)?))
    }
}

/// BPE token counter backed by `tiktoken-rs`
///
/// Encoders are built once per model and cached. Models tiktoken does not
/// know (Claude, Gemini, local models) are counted with `cl100k_base`.
pub struct TiktokenCounter {
    encoders: RwLock<HashMap<String, Arc<CoreBPE>>>,
}

impl TiktokenCounter {
    pub fn new() -> Self {
        Self {
            encoders: RwLock::new(HashMap::new()),
        }
    }

    fn encoder(&self, model: &str) -> AgentResult<Arc<CoreBPE>> {
        if let Some(bpe) = self
            .encoders
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(model)
        {
            return Ok(bpe.clone());
        }

        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .or_else(|_| tiktoken_rs::cl100k_base())
            .map_err(|e| AgentError::Internal(format!("tokenizer unavailable for {}: {}", model, e)))?;
        let bpe = Arc::new(bpe);

        self.encoders
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(model.to_string(), bpe.clone());

        Ok(bpe)
    }
}

impl Default for TiktokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for TiktokenCounter {
    fn count(&self, model: &str, text: &str) -> AgentResult<usize> {
        if text.is_empty() {
            return Ok(0);
        }
        let bpe = self.encoder(model)?;
        Ok(bpe.encode_with_special_tokens(text).len())
    }
}

/// Character-ratio estimator
///
/// Deterministic and model-agnostic; used where a BPE vocabulary is not
/// wanted (tests, benchmarks, offline tooling). Holds no per-text state.
pub struct CharRatioCounter {
    chars_per_token: f32,
}

impl CharRatioCounter {
    pub fn new() -> Self {
        Self::with_ratio(4.0)
    }

    /// Create with a specific chars-per-token ratio
    pub fn with_ratio(chars_per_token: f32) -> Self {
        Self { chars_per_token }
    }
}

impl Default for CharRatioCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for CharRatioCounter {
    fn count(&self, _model: &str, text: &str) -> AgentResult<usize> {
        Ok((text.chars().count() as f32 / self.chars_per_token).ceil() as usize)
    }
}
