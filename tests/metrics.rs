// tests/metrics.rs
//
// /metrics exposure and the proxy series, through the in-process app.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{get, keyed_config, Reply, ScriptedTransport};
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;

use atlas_proxy::AppState;

fn build_app(t: Arc<ScriptedTransport>) -> Router {
    atlas_proxy::build(AppState::new(keyed_config(), t)).expect("build app")
}

#[serial]
#[tokio::test]
async fn metrics_route_is_gated_by_env() {
    std::env::remove_var(atlas_proxy::ENV_METRICS_ROUTES);
    let resp = get(build_app(ScriptedTransport::new()), "/metrics").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[serial]
#[tokio::test]
async fn metrics_exposition_contains_proxy_series() {
    std::env::set_var(atlas_proxy::ENV_METRICS_ROUTES, "1");
    let t = ScriptedTransport::new()
        .on("congress.gov", Reply::json(200, json!({ "bills": [] })))
        .on("gdeltproject.org", Reply::text(503, "busy"));

    let ok = get(build_app(t.clone()), "/api/congress?q=farm").await;
    assert_eq!(ok.status, StatusCode::OK);
    let bad = get(build_app(t.clone()), "/api/gdelt?query=farm").await;
    assert_eq!(bad.status, StatusCode::BAD_GATEWAY);
    let rejected = get(build_app(t.clone()), "/api/congress").await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    let bad_source = get(build_app(t.clone()), "/api/gdelt?query=farm&source=radio").await;
    assert_eq!(bad_source.status, StatusCode::BAD_REQUEST);

    let resp = get(build_app(t), "/metrics").await;
    std::env::remove_var(atlas_proxy::ENV_METRICS_ROUTES);
    assert_eq!(resp.status, StatusCode::OK);
    let text = resp.text;
    for needle in [
        "proxy_requests_total",
        "proxy_rejected_requests_total",
        "proxy_upstream_failures_total",
        "proxy_upstream_duration_ms",
    ] {
        assert!(text.contains(needle), "metrics exposition missing '{needle}'\n{text}");
    }
    assert!(text.contains("provider=\"congress\""), "{text}");
    assert!(text.contains("kind=\"non_json\""), "{text}");
    assert!(
        text.contains("proxy_rejected_requests_total{provider=\"gdelt\"}"),
        "{text}"
    );
}
