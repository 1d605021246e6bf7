//! Context formatter
//!
//! Session fields arrive as heterogeneous JSON: plain strings, lists of
//! strings, lists of records with a designated text attribute, or maps of
//! records. Prompt interpolation needs every field as a single flat string
//! with no placeholder syntax and no empty entries.

use serde_json::Value;

/// Flatten one session field for prompt interpolation.
///
/// Field semantics are keyed by name: `causes` and `perpetuations` are lists
/// whose record entries carry `cause`/`text` attributes, `solutions` is a map
/// of plain strings, `fears` is a map of name/mitigation/contingency records.
/// Anything else gets best-effort stringification. Null or empty input yields
/// the empty string.
pub fn format_context_value(key: &str, value: &Value) -> String {
    if value.is_null() {
        return String::new();
    }

    match key {
        "causes" => join_entries(value, "cause"),
        "perpetuations" => join_entries(value, "text"),
        "solutions" => match value {
            Value::Object(map) => join_nonempty(map.values()),
            Value::String(s) => s.clone(),
            _ => String::new(),
        },
        "fears" => match value {
            Value::Object(map) => map
                .values()
                .filter_map(format_fear)
                .collect::<Vec<_>>()
                .join(" | "),
            _ => String::new(),
        },
        "mitigationStrategies" => match value {
            Value::Array(items) => join_nonempty(items.iter()),
            Value::String(s) => s.clone(),
            _ => String::new(),
        },
        // Scalar fields and unknown keys: best-effort flattening.
        _ => match value {
            Value::String(s) => s.clone(),
            Value::Array(items) => join_nonempty(items.iter()),
            Value::Object(map) => join_nonempty(map.values()),
            Value::Bool(_) | Value::Number(_) => value.to_string(),
            Value::Null => String::new(),
        },
    }
}

/// Lists whose entries are either strings or records with a named text
/// attribute. Falsy entries are dropped.
fn join_entries(value: &Value, attr: &str) -> String {
    let Value::Array(items) = value else {
        return String::new();
    };
    let parts: Vec<&str> = items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
            Value::Object(map) => map
                .get(attr)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty()),
            _ => None,
        })
        .collect();
    parts.join(", ")
}

fn join_nonempty<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    let parts: Vec<String> = values
        .filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect();
    parts.join(", ")
}

/// `"Fear: X; Mitigation: Y; Contingency: Z"` with empty parts omitted.
/// Records with none of the three fields are dropped entirely.
fn format_fear(record: &Value) -> Option<String> {
    let map = record.as_object()?;
    let field = |name: &str| {
        map.get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    };

    let mut parts = Vec::new();
    if let Some(name) = field("name") {
        parts.push(format!("Fear: {}", name));
    }
    if let Some(mitigation) = field("mitigation") {
        parts.push(format!("Mitigation: {}", mitigation));
    }
    if let Some(contingency) = field("contingency") {
        parts.push(format!("Contingency: {}", contingency));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}
