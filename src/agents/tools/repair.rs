//! Tolerant parsing of model-produced tool arguments

use serde_json::{Map, Value};

const MAX_ECHO_CHARS: usize = 200;

/// Parse tool-call arguments, repairing common model mistakes.
///
/// Handles code fences, empty input, trailing commas, and truncated output
/// (an unterminated string or unclosed brackets). Anything else yields a
/// descriptive error meant to be shown to the model.
pub fn repair_json(raw: &str) -> Result<Value, String> {
    let body = strip_fences(raw.trim());
    if body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    if let Ok(value) = serde_json::from_str(body) {
        return Ok(value);
    }

    let repaired = close_structure(body);
    serde_json::from_str(&repaired).map_err(|e| {
        format!(
            "invalid tool arguments ({}); received: {}",
            e,
            truncate(body, MAX_ECHO_CHARS)
        )
    })
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Drop trailing commas and close anything left open
fn close_structure(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' => {
                stack.push('}');
                out.push(c);
            }
            '[' => {
                stack.push(']');
                out.push(c);
            }
            '}' | ']' => {
                drop_trailing_comma(&mut out);
                if stack.last() == Some(&c) {
                    stack.pop();
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    drop_trailing_comma(&mut out);
    if out.trim_end().ends_with(':') {
        out.push_str("null");
    }

    while let Some(close) = stack.pop() {
        out.push(close);
    }
    out
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}
