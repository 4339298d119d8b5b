// src/proxy/client.rs
//! Upstream transport abstraction and the bounded (timed) client wrapped around it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Fully built upstream request. Constructed once by an adapter, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamQuery {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl UpstreamQuery {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: vec![("Accept".into(), "application/json".into())],
            body: None,
            timeout,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![
                ("Accept".into(), "application/json".into()),
                ("Content-Type".into(), "application/json".into()),
            ],
            body: Some(body),
            timeout,
        }
    }

    /// Set a header, replacing an earlier value with the same (case-insensitive) name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status + body text as received. Classification happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("Upstream timeout")]
    Timeout,
    #[error("{0}")]
    Transport(String),
}

/// One upstream round trip. Implemented over reqwest in production and by
/// scripted doubles in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, query: &UpstreamQuery) -> Result<RawResponse, NetworkError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, query: &UpstreamQuery) -> Result<RawResponse, NetworkError> {
        let mut req = match query.method {
            Method::Get => self.http.get(&query.url),
            Method::Post => self.http.post(&query.url),
        };
        for (k, v) in &query.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if let Some(body) = &query.body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(transport_error)?;
        Ok(RawResponse { status, body })
    }
}

fn transport_error(e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout
    } else {
        // reqwest's message embeds the request URL, which may carry a key.
        NetworkError::Transport(e.without_url().to_string())
    }
}

/// Wraps a [`Transport`] so that every call is bounded by the query's timeout.
///
/// The timer lives inside `tokio::time::timeout` and is dropped together with
/// the call future on every exit path.
#[derive(Clone)]
pub struct BoundedClient {
    transport: Arc<dyn Transport>,
}

impl BoundedClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn call(
        &self,
        provider: &'static str,
        query: &UpstreamQuery,
    ) -> Result<RawResponse, NetworkError> {
        let started = Instant::now();
        let out = match tokio::time::timeout(query.timeout, self.transport.execute(query)).await {
            Ok(res) => res,
            Err(_) => Err(NetworkError::Timeout),
        };

        let ms = started.elapsed().as_secs_f64() * 1_000.0;
        histogram!("proxy_upstream_duration_ms", "provider" => provider).record(ms);
        match &out {
            Ok(raw) => tracing::debug!(provider, status = raw.status, elapsed_ms = ms as u64, "upstream call"),
            Err(e) => tracing::warn!(provider, error = %e, elapsed_ms = ms as u64, "upstream call failed"),
        }
        out
    }
}
