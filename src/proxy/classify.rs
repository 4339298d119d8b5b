// src/proxy/classify.rs
//! Turns a raw upstream status + body into exactly one [`UpstreamResult`].
//!
//! Provider-specific "error in disguise" detection lives in a [`QuirkTable`]
//! owned by each adapter; `classify` itself knows no provider wording.
//!
//! Substring quirks can misfire on legitimate content that happens to contain
//! words like "error" or "invalid". Text probes are therefore only consulted
//! for bodies that failed to parse as JSON.

use serde_json::Value;

use super::client::NetworkError;

/// Maximum characters of upstream text echoed back to callers.
pub const EXCERPT_LIMIT: usize = 800;

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamResult {
    Success {
        status: u16,
        body: Value,
    },
    UpstreamError {
        status: u16,
        body: Option<Value>,
        excerpt: String,
        reason: Rejection,
    },
    NetworkError(NetworkError),
}

/// Why a response that did arrive was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Non-success HTTP status.
    Status,
    /// Body was not JSON.
    NonJson,
    /// Success status but a quirk rule recognized an error payload.
    Disguised(&'static str),
}

impl Rejection {
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::Status => "status",
            Rejection::NonJson => "non_json",
            Rejection::Disguised(_) => "disguised",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Probe {
    /// Raw (non-JSON) body contains the literal.
    TextContains(&'static str),
    /// Raw (non-JSON) body contains the literal, ASCII case-insensitive.
    TextContainsIgnoreCase(&'static str),
    /// Parsed body has a non-null value at this JSON pointer.
    JsonPointer(&'static str),
}

/// One (predicate, classification) pair.
#[derive(Debug, Clone, Copy)]
pub struct Quirk {
    pub probe: Probe,
    /// Status reported to the caller when the rule fires.
    pub status: u16,
    pub label: &'static str,
}

/// Ordered quirk rules; the first match wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuirkTable(&'static [Quirk]);

impl QuirkTable {
    pub const NONE: QuirkTable = QuirkTable(&[]);

    pub const fn new(rules: &'static [Quirk]) -> Self {
        Self(rules)
    }

    pub fn rules(&self) -> &'static [Quirk] {
        self.0
    }

    fn match_text(&self, text: &str) -> Option<&'static Quirk> {
        let lower = text.to_ascii_lowercase();
        self.0.iter().find(|q| match q.probe {
            Probe::TextContains(s) => text.contains(s),
            Probe::TextContainsIgnoreCase(s) => lower.contains(&s.to_ascii_lowercase()),
            Probe::JsonPointer(_) => false,
        })
    }

    fn match_json(&self, body: &Value) -> Option<&'static Quirk> {
        self.0.iter().find(|q| match q.probe {
            Probe::JsonPointer(p) => body.pointer(p).is_some_and(|v| !v.is_null()),
            _ => false,
        })
    }
}

pub fn classify(status: u16, text: &str, quirks: &QuirkTable) -> UpstreamResult {
    let ok = (200..300).contains(&status);

    let parsed = match serde_json::from_str::<Value>(text) {
        Ok(v) => v,
        Err(_) => {
            if ok {
                if let Some(rule) = quirks.match_text(text) {
                    return UpstreamResult::UpstreamError {
                        status: rule.status,
                        body: None,
                        excerpt: excerpt(text),
                        reason: Rejection::Disguised(rule.label),
                    };
                }
            }
            return UpstreamResult::UpstreamError {
                status,
                body: None,
                excerpt: excerpt(text),
                reason: Rejection::NonJson,
            };
        }
    };

    if !ok {
        return UpstreamResult::UpstreamError {
            status,
            body: Some(parsed),
            excerpt: excerpt(text),
            reason: Rejection::Status,
        };
    }

    if let Some(rule) = quirks.match_json(&parsed) {
        return UpstreamResult::UpstreamError {
            status: rule.status,
            body: Some(parsed),
            excerpt: excerpt(text),
            reason: Rejection::Disguised(rule.label),
        };
    }

    UpstreamResult::Success {
        status,
        body: parsed,
    }
}

/// First [`EXCERPT_LIMIT`] characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str) -> String {
    let mut it = text.char_indices();
    match it.nth(EXCERPT_LIMIT) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
