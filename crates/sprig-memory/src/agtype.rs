//! Decoding of Apache AGE `agtype` result text.
//!
//! AGE renders results as JSON with type annotations appended to composite
//! values, e.g. `{"id": 844424930131969, "label": "Topic", ...}::vertex`.

use serde_json::Value;

const ANNOTATIONS: &[&str] = &["::vertex", "::edge", "::path", "::numeric"];

/// Parse one `agtype` text value into JSON.
///
/// Type annotations outside string literals are stripped first. Anything that
/// still fails to parse is passed through unchanged as a JSON string.
pub fn parse_agtype(raw: &str) -> Value {
    let cleaned = strip_annotations(raw);
    serde_json::from_str(cleaned.trim()).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn strip_annotations(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = raw;

    while let Some(c) = rest.chars().next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            rest = &rest[c.len_utf8()..];
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if let Some(tag) = ANNOTATIONS.iter().find(|tag| rest.starts_with(**tag)) {
            rest = &rest[tag.len()..];
            continue;
        }

        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    out
}
