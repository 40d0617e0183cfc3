//! History truncation
//!
//! Count-based windowing and greedy, recency-biased token trimming.

use crate::agents::domain::{Message, Role};
use crate::agents::error::AgentResult;
use crate::agents::token::Tokenizer;

/// Keep only the last `limit` messages; `limit == 0` keeps everything
pub fn limit_messages(messages: &[Message], limit: usize) -> Vec<Message> {
    if limit == 0 || messages.len() <= limit {
        return messages.to_vec();
    }
    messages[messages.len() - limit..].to_vec()
}

/// Trim `messages` to fit `max_tokens`.
///
/// A leading system message is kept and counted first. The rest are taken
/// newest to oldest while they fit. If nothing beyond the system message
/// fits, only the newest message is returned.
pub fn trim_to_token_budget(
    messages: &[Message],
    max_tokens: usize,
    model: &str,
    tokenizer: &dyn Tokenizer,
) -> AgentResult<Vec<Message>> {
    if messages.is_empty() {
        return Ok(Vec::new());
    }

    let costs = messages
        .iter()
        .map(|m| tokenizer.count_message(model, m))
        .collect::<AgentResult<Vec<usize>>>()?;

    if costs.iter().sum::<usize>() <= max_tokens {
        return Ok(messages.to_vec());
    }

    let has_system = messages[0].role == Role::System;
    let start = usize::from(has_system);
    let mut used = if has_system { costs[0] } else { 0 };

    let mut kept = Vec::new();
    for idx in (start..messages.len()).rev() {
        if used + costs[idx] > max_tokens {
            break;
        }
        used += costs[idx];
        kept.push(idx);
    }

    if kept.is_empty() {
        return Ok(messages.last().cloned().into_iter().collect());
    }

    kept.reverse();
    let mut result = Vec::with_capacity(kept.len() + start);
    if has_system {
        result.push(messages[0].clone());
    }
    result.extend(kept.into_iter().map(|i| messages[i].clone()));
    Ok(result)
}
