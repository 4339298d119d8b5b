// src/proxy/normalize.rs
//! Field probing helpers shared by the per-provider normalizers.

use serde_json::Value;

/// First present, non-null, non-empty scalar among `candidates`, as a string.
///
/// A candidate starting with `/` is a JSON pointer (`/snippet/title`),
/// anything else a top-level key. Objects and arrays are skipped.
pub fn pick_str(record: &Value, candidates: &[&str]) -> String {
    candidates
        .iter()
        .filter_map(|c| lookup(record, c))
        .find_map(scalar_to_string)
        .unwrap_or_default()
}

/// First candidate key holding an array, or an empty slice.
pub fn pick_array<'a>(body: &'a Value, candidates: &[&str]) -> &'a [Value] {
    candidates
        .iter()
        .filter_map(|c| lookup(body, c))
        .find_map(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Opaque cursor passthrough: the first candidate that is neither null nor "".
pub fn pick_cursor(body: &Value, candidates: &[&str]) -> Option<Value> {
    candidates
        .iter()
        .filter_map(|c| lookup(body, c))
        .find(|v| !v.is_null() && v.as_str() != Some(""))
        .cloned()
}

fn lookup<'a>(record: &'a Value, candidate: &str) -> Option<&'a Value> {
    if candidate.starts_with('/') {
        record.pointer(candidate)
    } else {
        record.get(candidate)
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
