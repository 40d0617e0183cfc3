//! Retrieval option resolution

use serde_json::Value;
use std::collections::HashMap;

use crate::agents::config::RagConfig;
use crate::agents::params::{param_f32, param_str, param_usize};
use crate::config::RagSettings;

pub const RAG_MODE: &str = "rag_mode";
pub const RAG_TOP_K: &str = "rag_top_k";
pub const RAG_MIN_SCORE: &str = "rag_min_score";
pub const RAG_MAP_REDUCE_MAX_CHUNKS: &str = "rag_map_reduce_max_chunks";

/// How retrieved passages reach the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RagMode {
    /// Retrieval disabled for this call
    None,
    /// Passages concatenated verbatim
    #[default]
    Stuff,
    /// Passages summarized one by one, then combined
    MapReduce,
}

impl RagMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" | "off" => Some(RagMode::None),
            "stuff" => Some(RagMode::Stuff),
            "map_reduce" | "mapreduce" => Some(RagMode::MapReduce),
            _ => None,
        }
    }
}

/// Retrieval options for one call
#[derive(Debug, Clone, PartialEq)]
pub struct RagOptions {
    pub mode: RagMode,
    pub top_k: usize,
    pub min_score: f32,
    pub map_reduce_max_chunks: usize,
}

impl RagOptions {
    /// Built-in defaults, overridden by the agent config, overridden by call
    /// parameters. Malformed values at any layer are skipped.
    pub fn resolve(defaults: &RagSettings, agent: &RagConfig, params: &HashMap<String, Value>) -> Self {
        let mut options = Self {
            mode: RagMode::parse(&defaults.mode).unwrap_or_default(),
            top_k: defaults.top_k.max(1),
            min_score: defaults.min_score,
            map_reduce_max_chunks: defaults.map_reduce_max_chunks.max(1),
        };

        if let Some(mode) = agent.mode.as_deref().and_then(RagMode::parse) {
            options.mode = mode;
        }
        if let Some(top_k) = agent.top_k.filter(|k| *k > 0) {
            options.top_k = top_k;
        }
        if let Some(score) = agent.min_score.filter(valid_score) {
            options.min_score = score;
        }
        if let Some(max) = agent.map_reduce_max_chunks.filter(|m| *m > 0) {
            options.map_reduce_max_chunks = max;
        }

        if let Some(mode) = param_str(params, RAG_MODE).as_deref().and_then(RagMode::parse) {
            options.mode = mode;
        }
        if let Some(top_k) = param_usize(params, RAG_TOP_K).filter(|k| *k > 0) {
            options.top_k = top_k;
        }
        if let Some(score) = param_f32(params, RAG_MIN_SCORE).filter(valid_score) {
            options.min_score = score;
        }
        if let Some(max) = param_usize(params, RAG_MAP_REDUCE_MAX_CHUNKS).filter(|m| *m > 0) {
            options.map_reduce_max_chunks = max;
        }

        options
    }
}

fn valid_score(score: &f32) -> bool {
    (0.0..=1.0).contains(score)
}
