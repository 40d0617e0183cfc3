//! Prompt template rendering

use serde_json::Value;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::agents::error::{AgentError, AgentResult};

/// Render a Tera template with the input variables.
///
/// Text without `{{` or `{%` is returned as-is.
///
/// ```text
/// You are a {{ genre }} writer. Keep answers under {{ max_words }} words.
/// ```
pub fn render_template(template: &str, variables: &HashMap<String, Value>) -> AgentResult<String> {
    if !template.contains("{{") && !template.contains("{%") {
        return Ok(template.to_string());
    }

    let mut context = Context::new();
    for (key, value) in variables {
        match value {
            Value::String(s) => context.insert(key, s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    context.insert(key, &i);
                } else if let Some(f) = n.as_f64() {
                    context.insert(key, &f);
                }
            }
            Value::Bool(b) => context.insert(key, b),
            // Tera iterates arrays and objects natively
            Value::Array(_) | Value::Object(_) => context.insert(key, value),
            Value::Null => context.insert(key, &""),
        }
    }

    Tera::one_off(template, &context, false)
        .map_err(|e| AgentError::Configuration(format!("prompt template failed to render: {}", e)))
}
