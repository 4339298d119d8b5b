// src/api.rs
//! HTTP surface: one GET route per provider, CORS, panic capture, tracing.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::providers::{gdelt, Providers};
use crate::proxy::client::{BoundedClient, HttpTransport, Transport};
use crate::proxy::error::ProxyError;
use crate::proxy::validate::RawQuery;
use crate::proxy::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub providers: Arc<Providers>,
    pub config: Arc<ProxyConfig>,
}

impl AppState {
    pub fn new(config: ProxyConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            engine: Engine::new(BoundedClient::new(transport)),
            providers: Arc::new(Providers::from_config(&config)),
            config: Arc::new(config),
        }
    }

    /// Config from file + environment, real HTTP transport.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = ProxyConfig::load_default()?;
        let transport = HttpTransport::new(&config.user_agent)?;
        Ok(Self::new(config, Arc::new(transport)))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/gdelt", proxy_route(get(gdelt_handler)))
        .route("/api/govinfo", proxy_route(get(govinfo_handler)))
        .route("/api/census", proxy_route(get(census_handler)))
        .route("/api/congress", proxy_route(get(congress_handler)))
        .route("/api/youtube", proxy_route(get(youtube_handler)))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

pub fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

fn proxy_route(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.options(preflight).fallback(method_not_allowed)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> ProxyError {
    ProxyError::MethodNotAllowed
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    };
    tracing::error!(%message, "handler panicked");
    ProxyError::Internal(anyhow::anyhow!(message)).into_response()
}

type RawParams = Result<Query<HashMap<String, String>>, QueryRejection>;

fn raw_query(q: RawParams) -> Result<RawQuery, ProxyError> {
    q.map(|Query(map)| RawQuery::new(map))
        .map_err(|e| ProxyError::InvalidParameter {
            param: "query string",
            reason: e.body_text(),
        })
}

async fn gdelt_handler(State(s): State<AppState>, q: RawParams) -> Result<Response, ProxyError> {
    let raw = raw_query(q)?;
    let p = &s.providers;
    let source = raw
        .selector("source", Some("doc"), gdelt::SOURCES)
        .map_err(|e| s.engine.reject("gdelt", e))?;
    match source {
        "tv" => Ok(Json(s.engine.run(&p.gdelt_tv, &raw).await?).into_response()),
        _ => Ok(Json(s.engine.run(&p.gdelt_doc, &raw).await?).into_response()),
    }
}

async fn govinfo_handler(State(s): State<AppState>, q: RawParams) -> Result<Response, ProxyError> {
    let raw = raw_query(q)?;
    let page = s.providers.govinfo.search(&s.engine, &raw).await?;
    Ok(Json(page).into_response())
}

async fn census_handler(State(s): State<AppState>, q: RawParams) -> Result<Response, ProxyError> {
    let raw = raw_query(q)?;
    let table = s.providers.census.handle(&s.engine, &raw).await?;
    Ok(Json(table).into_response())
}

async fn congress_handler(State(s): State<AppState>, q: RawParams) -> Result<Response, ProxyError> {
    let raw = raw_query(q)?;
    let page = s.engine.run(&s.providers.congress, &raw).await?;
    Ok(Json(page).into_response())
}

async fn youtube_handler(State(s): State<AppState>, q: RawParams) -> Result<Response, ProxyError> {
    let raw = raw_query(q)?;
    let out = s.providers.youtube.handle(&s.engine, &raw).await?;
    Ok(Json(out).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panic_payload_becomes_generic_500() {
        let resp = panic_response(Box::new(String::from("index out of bounds")));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(resp.into_body(), 4096).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "error": "Unhandled proxy error", "message": "index out of bounds" })
        );

        let resp = panic_response(Box::new(42_u8));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn query_map_becomes_raw_query() {
        let raw = raw_query(Ok(Query(HashMap::from([("q".to_string(), "x".to_string())]))))
            .map(|r| r.get("q").map(str::to_string));
        assert_eq!(raw.unwrap().as_deref(), Some("x"));
    }
}
