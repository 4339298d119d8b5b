// src/proxy/mod.rs
//! Generic request pipeline: validate → build → bounded call → classify → normalize.
//!
//! Each upstream provider plugs in through [`Adapter`]; the [`Engine`] owns the
//! only piece of shared machinery (the bounded client) and stays free of any
//! provider wording.

pub mod classify;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod normalize;
pub mod pool;
pub mod validate;

use metrics::counter;
use serde::Serialize;
use serde_json::Value;

use self::classify::{classify, QuirkTable, UpstreamResult};
use self::client::{BoundedClient, UpstreamQuery};
use self::error::{AttemptOutcome, ProxyError};
use self::validate::RawQuery;

/// Per-provider capability set.
pub trait Adapter: Send + Sync {
    type Params: Send + Sync;
    type Output: Serialize + Send;

    /// Metrics/log label, e.g. `gdelt_doc`.
    fn name(&self) -> &'static str;

    /// Human label used in error messages, e.g. `GDELT DOC`.
    fn label(&self) -> &'static str;

    fn validate(&self, raw: &RawQuery) -> Result<Self::Params, ProxyError>;

    fn build(&self, params: &Self::Params) -> UpstreamQuery;

    fn quirks(&self) -> QuirkTable {
        QuirkTable::NONE
    }

    fn normalize(&self, params: &Self::Params, body: Value) -> Self::Output;

    /// Hook to enrich a failure with request context before it reaches the caller.
    fn contextualize(&self, _params: &Self::Params, err: ProxyError) -> ProxyError {
        err
    }
}

/// A labelled request inside a fallback chain.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub label: String,
    pub query: UpstreamQuery,
}

#[derive(Clone)]
pub struct Engine {
    client: BoundedClient,
}

impl Engine {
    pub fn new(client: BoundedClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &BoundedClient {
        &self.client
    }

    /// One bounded call plus classification. Never fails; failures are a variant.
    pub async fn fetch(
        &self,
        provider: &'static str,
        query: &UpstreamQuery,
        quirks: &QuirkTable,
    ) -> UpstreamResult {
        let result = match self.client.call(provider, query).await {
            Ok(raw) => classify(raw.status, &raw.body, quirks),
            Err(e) => UpstreamResult::NetworkError(e),
        };
        match &result {
            UpstreamResult::Success { .. } => {}
            UpstreamResult::UpstreamError { status, reason, .. } => {
                tracing::info!(provider, status, kind = reason.kind(), "upstream rejected request");
                counter!("proxy_upstream_failures_total", "provider" => provider, "kind" => reason.kind())
                    .increment(1);
            }
            UpstreamResult::NetworkError(_) => {
                counter!("proxy_upstream_failures_total", "provider" => provider, "kind" => "network")
                    .increment(1);
            }
        }
        result
    }

    /// Validate and execute a single-call adapter.
    pub async fn run<A: Adapter>(&self, adapter: &A, raw: &RawQuery) -> Result<A::Output, ProxyError> {
        let params = self.admit(adapter, raw)?;
        self.execute(adapter, &params).await
    }

    /// Count the request and validate it. Nothing goes upstream when this fails.
    pub fn admit<A: Adapter>(&self, adapter: &A, raw: &RawQuery) -> Result<A::Params, ProxyError> {
        counter!("proxy_requests_total", "provider" => adapter.name()).increment(1);
        adapter.validate(raw).inspect_err(|e| {
            counter!("proxy_rejected_requests_total", "provider" => adapter.name()).increment(1);
            tracing::debug!(provider = adapter.name(), error = %e, "request rejected");
        })
    }

    /// Count a request refused before any adapter was chosen.
    pub fn reject(&self, provider: &'static str, err: ProxyError) -> ProxyError {
        counter!("proxy_requests_total", "provider" => provider).increment(1);
        counter!("proxy_rejected_requests_total", "provider" => provider).increment(1);
        tracing::debug!(provider, error = %err, "request rejected");
        err
    }

    /// Execute an adapter with already validated parameters.
    pub async fn execute<A: Adapter>(
        &self,
        adapter: &A,
        params: &A::Params,
    ) -> Result<A::Output, ProxyError> {
        let query = adapter.build(params);
        let body = self
            .fetch_json(adapter.name(), adapter.label(), &query, &adapter.quirks())
            .await
            .map_err(|e| adapter.contextualize(params, e))?;
        Ok(adapter.normalize(params, body))
    }

    /// [`Engine::fetch`] with failures converted to [`ProxyError`].
    pub async fn fetch_json(
        &self,
        provider: &'static str,
        label: &'static str,
        query: &UpstreamQuery,
        quirks: &QuirkTable,
    ) -> Result<Value, ProxyError> {
        match self.fetch(provider, query, quirks).await {
            UpstreamResult::Success { body, .. } => Ok(body),
            other => Err(ProxyError::from_result(label, other)
                .unwrap_or_else(|| ProxyError::Internal(anyhow::anyhow!("unclassified upstream result")))),
        }
    }

    /// Try each attempt in order and return the first success with its label.
    /// No attempt after a success is issued.
    pub async fn first_success(
        &self,
        provider: &'static str,
        attempts: &[Attempt],
        quirks: &QuirkTable,
    ) -> Result<(String, Value), Vec<AttemptOutcome>> {
        let mut failures = Vec::with_capacity(attempts.len());
        for attempt in attempts {
            counter!("proxy_fallback_attempts_total", "provider" => provider).increment(1);
            match self.fetch(provider, &attempt.query, quirks).await {
                UpstreamResult::Success { body, .. } => {
                    tracing::info!(provider, label = %attempt.label, skipped = failures.len(), "fallback chain resolved");
                    return Ok((attempt.label.clone(), body));
                }
                UpstreamResult::UpstreamError { status, reason, .. } => {
                    failures.push(AttemptOutcome {
                        label: attempt.label.clone(),
                        status: Some(status),
                        error: reason.kind().to_string(),
                    });
                }
                UpstreamResult::NetworkError(e) => failures.push(AttemptOutcome {
                    label: attempt.label.clone(),
                    status: None,
                    error: e.to_string(),
                }),
            }
        }
        Err(failures)
    }
}

/// Short, stable identifier for a query so logs never carry the raw text.
pub fn query_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_id_is_stable_and_short() {
        let a = query_id("voter turnout");
        assert_eq!(a.len(), 12);
        assert_eq!(a, query_id("voter turnout"));
        assert_ne!(a, query_id("voter turnout!"));
    }
}
