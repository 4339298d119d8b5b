// src/proxy/error.rs
//! Caller-facing error taxonomy. Every variant renders as a JSON object with
//! at least an `error` field.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::classify::{Rejection, UpstreamResult, EXCERPT_LIMIT};
use super::client::NetworkError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid {param}. Use {}", usage(param, valid))]
    InvalidSelector {
        param: &'static str,
        value: String,
        valid: &'static [&'static str],
    },

    #[error("Invalid parameter {param}: {reason}")]
    InvalidParameter { param: &'static str, reason: String },

    #[error("{provider} {}", describe(reason, detail.as_deref()))]
    Upstream {
        provider: &'static str,
        status: u16,
        excerpt: String,
        body: Option<Value>,
        reason: Rejection,
        query: Option<String>,
        /// Provider's own error message, when it sends one.
        detail: Option<String>,
    },

    #[error("Upstream timeout")]
    Timeout { provider: &'static str },

    #[error("{provider} request failed: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },

    #[error("{message}")]
    FallbackExhausted {
        message: &'static str,
        attempts: Vec<AttemptOutcome>,
    },

    #[error("Method not allowed. Use GET")]
    MethodNotAllowed,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn usage(param: &str, valid: &[&str]) -> String {
    valid
        .iter()
        .map(|v| format!("{param}={v}"))
        .collect::<Vec<_>>()
        .join(" or ")
}

fn describe(reason: &Rejection, detail: Option<&str>) -> String {
    let head = match reason {
        Rejection::Status => "upstream error".to_string(),
        Rejection::NonJson => "returned non-JSON".to_string(),
        Rejection::Disguised(label) => format!("rejected the request ({label})"),
    };
    match detail {
        Some(d) => format!("{head}: {d}"),
        None => head,
    }
}

/// Outcome of one attempt in a fallback chain, reported when all of them fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptOutcome {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub error: String,
}

impl ProxyError {
    /// Convert a non-success [`UpstreamResult`] into the matching error.
    /// Returns `None` for `Success`.
    pub fn from_result(provider: &'static str, result: UpstreamResult) -> Option<Self> {
        match result {
            UpstreamResult::Success { .. } => None,
            UpstreamResult::UpstreamError {
                status,
                body,
                excerpt,
                reason,
            } => Some(ProxyError::Upstream {
                provider,
                status,
                excerpt,
                body,
                reason,
                query: None,
                detail: None,
            }),
            UpstreamResult::NetworkError(NetworkError::Timeout) => {
                Some(ProxyError::Timeout { provider })
            }
            UpstreamResult::NetworkError(NetworkError::Transport(message)) => {
                Some(ProxyError::Transport { provider, message })
            }
        }
    }

    /// Attach the (sanitized) query that was sent upstream.
    pub fn with_query(mut self, q: &str) -> Self {
        if let ProxyError::Upstream { query, .. } = &mut self {
            *query = Some(q.to_string());
        }
        self
    }

    /// Lift the provider's message at `pointer` out of the upstream body.
    pub fn with_upstream_message(mut self, pointer: &str) -> Self {
        if let ProxyError::Upstream {
            body: Some(b),
            detail,
            ..
        } = &mut self
        {
            *detail = b
                .pointer(pointer)
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_string);
        }
        self
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingParameter(_)
            | ProxyError::InvalidSelector { .. }
            | ProxyError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::Upstream {
                reason: Rejection::NonJson,
                ..
            } => StatusCode::BAD_GATEWAY,
            ProxyError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Transport { .. } | ProxyError::FallbackExhausted { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body sent to the caller.
    pub fn to_body(&self) -> Value {
        let mut obj = Map::new();
        match self {
            ProxyError::Internal(e) => {
                obj.insert("error".into(), json!("Unhandled proxy error"));
                obj.insert("message".into(), json!(e.to_string()));
                return Value::Object(obj);
            }
            other => {
                obj.insert("error".into(), json!(other.to_string()));
            }
        }

        match self {
            ProxyError::InvalidSelector { param, value, .. } => {
                obj.insert((*param).to_string(), json!(value));
            }
            ProxyError::Upstream {
                status,
                excerpt,
                body,
                reason,
                query,
                ..
            } => {
                obj.insert("upstream_status".into(), json!(status));
                // Large upstream bodies are only echoed as a bounded excerpt.
                match (reason, body) {
                    (Rejection::Status, Some(b)) if b.to_string().len() <= EXCERPT_LIMIT => {
                        obj.insert("upstream".into(), b.clone());
                    }
                    _ => {
                        obj.insert("upstream_text".into(), json!(excerpt));
                    }
                }
                if let Some(q) = query {
                    obj.insert("query".into(), json!(q));
                }
            }
            ProxyError::FallbackExhausted { attempts, .. } => {
                obj.insert("attempts".into(), json!(attempts));
            }
            _ => {}
        }
        Value::Object(obj)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "proxy request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "proxy request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}
