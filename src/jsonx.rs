//! Tolerant JSON extraction
//!
//! Structured stages ask the model for strict JSON and usually get it, but
//! common corruption shows up often enough to handle centrally: markdown
//! code fences around the payload, prose before or after the object, and
//! raw line breaks inside string literals. Every structured-output call
//! site parses through here.

use anyhow::{Context, Result};
use serde_json::Value;

/// Parse a JSON value out of raw model output, repairing the common
/// corruption patterns first. Fails only when no repair produces valid JSON.
pub fn extract_json(raw: &str) -> Result<Value> {
    let stripped = strip_fences(raw);

    if let Ok(value) = serde_json::from_str(stripped) {
        return Ok(value);
    }

    let sliced = balanced_slice(stripped);
    if let Ok(value) = serde_json::from_str(sliced) {
        return Ok(value);
    }

    let repaired = escape_bare_newlines(sliced);
    serde_json::from_str(&repaired).with_context(|| {
        format!(
            "unparseable model output after repair: {:.120}",
            raw.trim().replace('\n', " ")
        )
    })
}

/// Drop a leading ```` ```json ```` / ```` ``` ```` fence line and a
/// trailing fence, if present.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Skip the info string ("json") up to the end of the fence line.
        text = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches("json"),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// The slice from the first `{` or `[` to its matching close bracket,
/// respecting string literals. Trims prose around the payload and drops
/// trailing junk after the object ends.
fn balanced_slice(text: &str) -> &str {
    let bytes = text.as_bytes();
    let Some(start) = text.find(['{', '[']) else {
        return text;
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &text[start..=i];
                }
            }
            _ => {}
        }
    }

    // Never closed; hand back what we have and let the parser complain.
    &text[start..]
}

/// Escape raw control characters that models sometimes emit inside string
/// literals (typically a line break in the middle of a "reasoning" field).
fn escape_bare_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => {}
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

/// Pull a named array of strings out of a parsed payload, dropping empty
/// entries. The shape every option-generating stage shares.
pub fn string_array(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
