// src/lib.rs
// Public library surface for the binary and for integration tests.

pub mod api;
pub mod config;
pub mod metrics;
pub mod providers;
pub mod proxy;

// `atlas_proxy::router` as well as `atlas_proxy::api::router`
pub use crate::api::{router, AppState};

use axum::Router;

/// Env flag that mounts `/metrics` on the public router.
pub const ENV_METRICS_ROUTES: &str = "METRICS_ROUTES";

fn metrics_routes_enabled() -> bool {
    std::env::var(ENV_METRICS_ROUTES)
        .ok()
        .is_some_and(|v| v.trim() == "1")
}

/// Full application: proxy routes over the real HTTP transport, with
/// `/metrics` mounted when `METRICS_ROUTES=1`.
pub async fn app() -> anyhow::Result<Router> {
    let state = AppState::from_env()?;
    build(state)
}

/// Same as [`app`] with a caller-provided state (tests inject a fake transport).
pub fn build(state: AppState) -> anyhow::Result<Router> {
    let metrics = metrics::Metrics::init()?;
    let mut router = api::router(state);
    if metrics_routes_enabled() {
        router = router.merge(metrics.router());
    }
    Ok(router)
}
