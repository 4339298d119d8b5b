// src/providers/govinfo.rs
//! GovInfo full-text search (Congressional Record floor proceedings by default)
//! with snippet enrichment of the first results.

use std::time::Duration;

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{EnrichmentSettings, ProviderSettings};
use crate::proxy::classify::{QuirkTable, UpstreamResult};
use crate::proxy::client::UpstreamQuery;
use crate::proxy::endpoint::{ensure_api_key, strip_api_key, KeyPlacement, UrlBuilder};
use crate::proxy::error::ProxyError;
use crate::proxy::normalize::{pick_array, pick_cursor, pick_str};
use crate::proxy::pool::bounded_map;
use crate::proxy::validate::{Clamp, RawQuery};
use crate::proxy::{query_id, Adapter, Engine};

use super::snippet::{extract_needles, make_snippet, strip_html};

pub const PAGE_SIZE: Clamp = Clamp::new(1, 50, 25);
pub const FIRST_PAGE: &str = "*";
pub const KEY: KeyPlacement = KeyPlacement::Query("api_key");

static RE_SCOPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)collection\s*:|docclass\s*:").expect("scope regex"));

/// Scope a bare query to House/Senate floor proceedings unless the caller
/// already names a collection or document class.
pub fn build_floor_query(user_query: &str) -> String {
    if RE_SCOPED.is_match(user_query) {
        return user_query.to_string();
    }
    format!("collection:(CREC) AND (docClass:(HOUSE OR SENATE)) AND ({user_query})")
}

#[derive(Debug, Clone, Copy)]
enum ChamberField {
    DocClass,
    GranuleId,
}

/// Ordered checks; the first substring hit decides.
const CHAMBER_RULES: &[(ChamberField, &str, &str)] = &[
    (ChamberField::DocClass, "HOUSE", "House"),
    (ChamberField::DocClass, "SENATE", "Senate"),
    (ChamberField::GranuleId, "PgH", "House"),
    (ChamberField::GranuleId, "PgS", "Senate"),
    (ChamberField::GranuleId, "PgD", "Daily Digest"),
    (ChamberField::GranuleId, "PgE", "Extensions"),
];

pub fn infer_chamber(r: &Value) -> String {
    let doc_class = pick_str(r, &["docClass"]).to_ascii_uppercase();
    let granule = pick_str(r, &["granuleId"]);
    CHAMBER_RULES
        .iter()
        .find(|(field, needle, _)| match field {
            ChamberField::DocClass => doc_class.contains(needle),
            ChamberField::GranuleId => granule.contains(needle),
        })
        .map(|(_, _, chamber)| (*chamber).to_string())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GovDocument {
    pub title: String,
    pub date_issued: String,
    pub chamber: String,
    pub details_link: String,
    pub package_id: String,
    pub granule_id: String,
    pub snippet: String,
}

impl GovDocument {
    pub fn from_record(r: &Value) -> Self {
        Self {
            title: pick_str(r, &["title", "packageTitle", "granuleTitle"]),
            date_issued: pick_str(r, &["dateIssued", "publishDate", "lastModified"]),
            chamber: infer_chamber(r),
            details_link: strip_api_key(&pick_str(r, &["resultLink", "link"])),
            package_id: pick_str(r, &["packageId"]),
            granule_id: pick_str(r, &["granuleId"]),
            snippet: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GovinfoPage {
    pub results: Vec<GovDocument>,
    /// Opaque next-page cursor, passed through untouched.
    pub offset_mark: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovinfoParams {
    pub api_key: String,
    pub user_query: String,
    pub full_query: String,
    pub page_size: u32,
    pub offset_mark: String,
}

pub struct GovinfoSearch {
    settings: ProviderSettings,
}

impl GovinfoSearch {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    pub fn timeout(&self) -> Duration {
        self.settings.timeout()
    }
}

impl Adapter for GovinfoSearch {
    type Params = GovinfoParams;
    type Output = GovinfoPage;

    fn name(&self) -> &'static str {
        "govinfo"
    }

    fn label(&self) -> &'static str {
        "GovInfo search"
    }

    fn validate(&self, raw: &RawQuery) -> Result<GovinfoParams, ProxyError> {
        let api_key = self
            .settings
            .resolve_key(raw.get("api_key"))
            .ok_or(ProxyError::MissingParameter("api_key"))?;
        let user_query = raw.require("query")?.to_string();
        Ok(GovinfoParams {
            api_key,
            full_query: build_floor_query(&user_query),
            user_query,
            page_size: PAGE_SIZE.apply(raw.get("pageSize")),
            offset_mark: raw.get("offsetMark").unwrap_or(FIRST_PAGE).to_string(),
        })
    }

    fn build(&self, p: &GovinfoParams) -> UpstreamQuery {
        let url = UrlBuilder::new(&self.settings.base_url)
            .credential(KEY, &p.api_key)
            .build();
        let body = json!({
            "query": p.full_query,
            "pageSize": p.page_size.to_string(),
            "offsetMark": p.offset_mark,
            "sorts": [{ "field": "publishdate", "sortOrder": "DESC" }],
        });
        UpstreamQuery::post_json(url, body, self.settings.timeout())
    }

    fn normalize(&self, _p: &GovinfoParams, body: Value) -> GovinfoPage {
        GovinfoPage {
            results: pick_array(&body, &["results"])
                .iter()
                .map(GovDocument::from_record)
                .collect(),
            offset_mark: pick_cursor(&body, &["offsetMark", "nextOffsetMark"]),
        }
    }
}

/// Search adapter plus the enrichment stage.
pub struct Govinfo {
    search: GovinfoSearch,
    enrichment: EnrichmentSettings,
}

impl Govinfo {
    pub fn new(settings: ProviderSettings, enrichment: EnrichmentSettings) -> Self {
        Self {
            search: GovinfoSearch::new(settings),
            enrichment,
        }
    }

    pub async fn search(&self, engine: &Engine, raw: &RawQuery) -> Result<GovinfoPage, ProxyError> {
        let params = engine.admit(&self.search, raw)?;
        tracing::info!(provider = "govinfo", query_id = %query_id(&params.user_query), page_size = params.page_size, "govinfo search");

        let mut page = engine.execute(&self.search, &params).await?;
        let needles = extract_needles(&params.user_query);
        page.results = enrich(
            engine,
            &self.enrichment,
            self.search.timeout(),
            &params.api_key,
            &needles,
            page.results,
        )
        .await;
        Ok(page)
    }
}

/// Fill `snippet` for the first `cap` results, `concurrency` at a time.
/// Order is preserved and results past the cap are returned untouched.
pub async fn enrich(
    engine: &Engine,
    settings: &EnrichmentSettings,
    timeout: Duration,
    api_key: &str,
    needles: &[String],
    mut results: Vec<GovDocument>,
) -> Vec<GovDocument> {
    let cap = settings.cap.min(results.len());
    let rest = results.split_off(cap);
    let width = settings.snippet_width;

    let mut head = bounded_map(settings.concurrency, results, move |mut doc| async move {
        doc.snippet = fetch_snippet(engine, &doc.details_link, api_key, needles, width, timeout).await;
        doc
    })
    .await;
    head.extend(rest);
    head
}

async fn fetch_snippet(
    engine: &Engine,
    details_link: &str,
    api_key: &str,
    needles: &[String],
    width: usize,
    timeout: Duration,
) -> String {
    match try_fetch_snippet(engine, details_link, api_key, needles, width, timeout).await {
        Some(s) => s,
        None => {
            counter!("proxy_enrichment_failures_total").increment(1);
            String::new()
        }
    }
}

async fn try_fetch_snippet(
    engine: &Engine,
    details_link: &str,
    api_key: &str,
    needles: &[String],
    width: usize,
    timeout: Duration,
) -> Option<String> {
    if details_link.is_empty() {
        return None;
    }

    let summary_q = UpstreamQuery::get(ensure_api_key(details_link, api_key), timeout);
    let summary = match engine.fetch("govinfo_detail", &summary_q, &QuirkTable::NONE).await {
        UpstreamResult::Success { body, .. } => body,
        _ => return None,
    };

    let link = pick_str(
        &summary,
        &[
            "/download/txtLink",
            "/download/textLink",
            "/download/htmLink",
            "/download/htmlLink",
            "/downloads/txtLink",
            "/downloads/textLink",
            "/downloads/htmLink",
            "/downloads/htmlLink",
            "txtLink",
            "htmLink",
        ],
    );
    if link.is_empty() {
        return None;
    }

    let content_q = UpstreamQuery::get(ensure_api_key(&strip_api_key(&link), api_key), timeout)
        .with_header("Accept", "text/plain,text/html;q=0.9");
    let raw = engine.client().call("govinfo_content", &content_q).await.ok()?;
    if !raw.is_success() {
        return None;
    }
    let text = strip_html(&raw.body);
    if text.is_empty() {
        return None;
    }
    Some(make_snippet(&text, needles, width))
}
