// tests/common/mod.rs
//
// Shared helpers for the HTTP-level tests: a scripted in-memory Transport
// (no network) plus request/response plumbing around tower::ServiceExt::oneshot.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt as _;

use atlas_proxy::config::ProxyConfig;
use atlas_proxy::proxy::client::{NetworkError, RawResponse, Transport, UpstreamQuery};
use atlas_proxy::AppState;

pub const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub enum Reply {
    Respond {
        status: u16,
        body: String,
        delay: Option<Duration>,
    },
    /// Never answers; only the client timeout ends the call.
    Hang,
    Fail(String),
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Reply::Respond {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Reply::Respond {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(self, d: Duration) -> Self {
        match self {
            Reply::Respond { status, body, .. } => Reply::Respond {
                status,
                body,
                delay: Some(d),
            },
            other => other,
        }
    }
}

/// Replies chosen by the first URL substring that matches; unmatched URLs get 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<Vec<UpstreamQuery>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(self: &Arc<Self>, url_part: &str, reply: Reply) -> Arc<Self> {
        self.routes
            .lock()
            .unwrap()
            .push((url_part.to_string(), reply));
        self.clone()
    }

    pub fn calls(&self) -> Vec<UpstreamQuery> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_matching(&self, url_part: &str) -> usize {
        self.calls()
            .iter()
            .filter(|q| q.url.contains(url_part))
            .count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn reply_for(&self, url: &str) -> Reply {
        self.routes
            .lock()
            .unwrap()
            .iter()
            .find(|(part, _)| url.contains(part.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| Reply::text(404, "{\"error\":\"no scripted route\"}"))
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, query: &UpstreamQuery) -> Result<RawResponse, NetworkError> {
        self.calls.lock().unwrap().push(query.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match self.reply_for(&query.url) {
            Reply::Respond {
                status,
                body,
                delay,
            } => {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                Ok(RawResponse { status, body })
            }
            Reply::Hang => std::future::pending().await,
            Reply::Fail(msg) => Err(NetworkError::Transport(msg)),
        }
    }
}

/// Default config with provider keys filled in.
pub fn keyed_config() -> ProxyConfig {
    let mut cfg = ProxyConfig::default();
    cfg.census.api_key = Some("census-key".into());
    cfg.congress.api_key = Some("congress-key".into());
    cfg.youtube.api_key = Some("youtube-key".into());
    cfg
}

pub fn app_with(cfg: ProxyConfig, transport: Arc<ScriptedTransport>) -> Router {
    atlas_proxy::router(AppState::new(cfg, transport))
}

pub fn app(transport: Arc<ScriptedTransport>) -> Router {
    app_with(keyed_config(), transport)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text)
            .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", self.text))
    }
}

pub async fn send(app: Router, method: &str, uri: &str) -> TestResponse {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    TestResponse {
        status,
        headers,
        text: String::from_utf8(bytes).expect("utf8"),
    }
}

pub async fn get(app: Router, uri: &str) -> TestResponse {
    send(app, "GET", uri).await
}
