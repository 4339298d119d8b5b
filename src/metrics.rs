// src/metrics.rs
use anyhow::Result;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Safe to call repeatedly; the recorder
    /// is installed once per process and later calls share its handle.
    pub fn init() -> Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new().install_recorder()?;
                describe();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("proxy_requests_total", "Proxy requests received, per provider.");
    describe_counter!(
        "proxy_rejected_requests_total",
        "Requests rejected by validation before any upstream call."
    );
    describe_counter!(
        "proxy_upstream_failures_total",
        "Upstream calls that did not succeed, by provider and kind."
    );
    describe_counter!(
        "proxy_fallback_attempts_total",
        "Requests issued while walking a fallback chain."
    );
    describe_counter!(
        "proxy_enrichment_failures_total",
        "Enrichment lookups that produced no snippet."
    );
    describe_histogram!(
        "proxy_upstream_duration_ms",
        "Upstream call latency in milliseconds."
    );
}
