//! Typed resolution of free-form per-call parameters
//!
//! `AgentInput::extra_params` is an untyped JSON map. Every coercion the
//! runtime needs lives here; unknown or malformed values resolve to `None`
//! so callers fall back to the next-lower-precedence default.

use serde_json::Value;
use std::collections::HashMap;

use crate::config::ContextSettings;

pub const HISTORY_LIMIT: &str = "history_limit";
pub const HISTORY_MAX_TOKENS: &str = "history_max_tokens";
pub const COMPRESSION_THRESHOLD: &str = "compression_threshold";
pub const MEMORY_MODE: &str = "memory_mode";

/// Read a signed integer (number, integral float, or numeric string)
pub fn param_i64(params: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match params.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a non-negative integer
pub fn param_usize(params: &HashMap<String, Value>, key: &str) -> Option<usize> {
    param_i64(params, key).and_then(|v| usize::try_from(v).ok())
}

/// Read a float (number or numeric string)
pub fn param_f32(params: &HashMap<String, Value>, key: &str) -> Option<f32> {
    let value: Option<f32> = match params.get(key)? {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    value.filter(|f| f.is_finite())
}

/// Read a boolean (bool, "true"/"false"/"1"/"0"/"yes"/"no", or 0/1)
pub fn param_bool(params: &HashMap<String, Value>, key: &str) -> Option<bool> {
    match params.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Read a non-empty string; numbers and booleans are stringified
pub fn param_str(params: &HashMap<String, Value>, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// How session memory is presented to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryMode {
    /// Recent history only
    #[default]
    Window,
    /// Recent history preceded by the stored rolling summary
    Summary,
}

impl MemoryMode {
    pub fn from_params(params: &HashMap<String, Value>) -> Self {
        match param_str(params, MEMORY_MODE).as_deref() {
            Some(mode) if mode.eq_ignore_ascii_case("summary") => MemoryMode::Summary,
            _ => MemoryMode::Window,
        }
    }
}

/// Per-call execution options, resolved once from settings + extra params
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOptions {
    /// Max history messages; `None` keeps the full history
    pub history_limit: Option<usize>,
    /// Token budget for history trimming; 0 disables token trimming
    pub history_max_tokens: usize,
    /// History token count above which compression kicks in
    pub compression_threshold: usize,
    pub memory_mode: MemoryMode,
}

impl ExecutionOptions {
    pub fn resolve(params: &HashMap<String, Value>, defaults: &ContextSettings) -> Self {
        let history_limit = match param_i64(params, HISTORY_LIMIT) {
            Some(n) if n <= 0 => None,
            Some(n) => Some(n as usize),
            None if defaults.history_limit == 0 => None,
            None => Some(defaults.history_limit),
        };

        Self {
            history_limit,
            history_max_tokens: param_usize(params, HISTORY_MAX_TOKENS)
                .unwrap_or(defaults.history_max_tokens),
            compression_threshold: param_usize(params, COMPRESSION_THRESHOLD)
                .filter(|t| *t > 0)
                .unwrap_or(defaults.compression_threshold),
            memory_mode: MemoryMode::from_params(params),
        }
    }

    /// History limit in the `get_history` convention (0 = unlimited)
    pub fn history_limit_or_zero(&self) -> usize {
        self.history_limit.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_coercions() {
        let p = params(json!({
            "a": 3, "b": "7", "c": 2.0, "d": "x", "e": -1,
            "f": "0.5", "g": "yes", "h": 1, "i": [1]
        }));
        assert_eq!(param_usize(&p, "a"), Some(3));
        assert_eq!(param_usize(&p, "b"), Some(7));
        assert_eq!(param_usize(&p, "c"), Some(2));
        assert_eq!(param_usize(&p, "d"), None);
        assert_eq!(param_usize(&p, "e"), None);
        assert_eq!(param_f32(&p, "f"), Some(0.5));
        assert_eq!(param_bool(&p, "g"), Some(true));
        assert_eq!(param_bool(&p, "h"), Some(true));
        assert_eq!(param_bool(&p, "i"), None);
        assert_eq!(param_str(&p, "missing"), None);
    }

    #[test]
    fn test_execution_options_precedence() {
        let defaults = ContextSettings::default();

        let resolved = ExecutionOptions::resolve(&HashMap::new(), &defaults);
        assert_eq!(resolved.history_limit, Some(defaults.history_limit));
        assert_eq!(resolved.compression_threshold, 4000);
        assert_eq!(resolved.memory_mode, MemoryMode::Window);

        let p = params(json!({
            "history_limit": 0,
            "compression_threshold": "bogus",
            "memory_mode": "SUMMARY"
        }));
        let resolved = ExecutionOptions::resolve(&p, &defaults);
        assert_eq!(resolved.history_limit, None);
        assert_eq!(resolved.compression_threshold, 4000);
        assert_eq!(resolved.memory_mode, MemoryMode::Summary);

        let p = params(json!({ "history_limit": "5", "compression_threshold": 100 }));
        let resolved = ExecutionOptions::resolve(&p, &defaults);
        assert_eq!(resolved.history_limit, Some(5));
        assert_eq!(resolved.compression_threshold, 100);
    }
}
