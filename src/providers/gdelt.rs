// src/providers/gdelt.rs
//! GDELT DOC (articles) and TV (broadcast clips) search.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::ProviderSettings;
use crate::proxy::classify::{Probe, Quirk, QuirkTable};
use crate::proxy::client::UpstreamQuery;
use crate::proxy::endpoint::UrlBuilder;
use crate::proxy::error::ProxyError;
use crate::proxy::normalize::{pick_array, pick_str};
use crate::proxy::validate::{Clamp, RawQuery, TimespanTable};
use crate::proxy::Adapter;

pub const SOURCES: &[&str] = &["doc", "tv"];

pub const MAX_RECORDS: Clamp = Clamp::new(1, 250, 50);

const ACCEPT: &str = "application/json,text/plain;q=0.9,*/*;q=0.8";

/// GDELT answers some bad queries with HTTP 200 and a plain-text sentence.
pub const QUIRKS: QuirkTable = QuirkTable::new(&[
    Quirk {
        probe: Probe::TextContains("The specified phrase is too short"),
        status: 400,
        label: "phrase too short",
    },
    Quirk {
        probe: Probe::TextContainsIgnoreCase("error"),
        status: 400,
        label: "plain-text error",
    },
    Quirk {
        probe: Probe::TextContainsIgnoreCase("invalid"),
        status: 400,
        label: "invalid query",
    },
]);

pub const DOC_TIMESPANS: TimespanTable = TimespanTable {
    entries: &[("1m", "30d"), ("3m", "90d"), ("6m", "180d"), ("1y", "365d")],
    custom: doc_custom_timespan,
    fallback: "30d",
};

pub const TV_TIMESPANS: TimespanTable = TimespanTable {
    entries: &[
        ("1m", "30days"),
        ("3m", "90days"),
        ("6m", "180days"),
        ("1y", "365days"),
    ],
    custom: tv_custom_timespan,
    fallback: "30days",
};

static RE_DOC_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+(h|d|w|m|y)$").expect("doc span regex"));
static RE_TV_DAYS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+days$").expect("tv days regex"));
static RE_TV_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+)(h|d|w)$").expect("tv span regex"));

fn doc_custom_timespan(t: &str) -> Option<String> {
    RE_DOC_SPAN.is_match(t).then(|| t.to_string())
}

fn tv_custom_timespan(t: &str) -> Option<String> {
    if RE_TV_DAYS.is_match(t) {
        return Some(t.to_string());
    }
    let caps = RE_TV_SPAN.captures(t)?;
    let n: u64 = caps[1].parse().ok()?;
    let days = match &caps[2] {
        "h" => ((n as f64 / 24.0).round() as u64).max(1),
        "d" => n,
        "w" => n.saturating_mul(7),
        _ => return None,
    };
    Some(format!("{days}days"))
}

static RE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("quoted regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

/// GDELT rejects quoted phrases shorter than 4 alphanumerics; unquote those,
/// keep longer phrases quoted, collapse whitespace.
pub fn sanitize_query(q: &str) -> String {
    let ascii = q
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let unquoted = RE_QUOTED.replace_all(&ascii, |caps: &regex::Captures| {
        let inner = &caps[1];
        let alnum = inner.chars().filter(|c| c.is_ascii_alphanumeric()).count();
        if alnum < 4 {
            inner.to_string()
        } else {
            caps[0].to_string()
        }
    });
    RE_WS.replace_all(&unquoted, " ").trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdeltParams {
    /// Sanitized query, exactly as sent upstream.
    pub query: String,
    pub timespan: String,
    pub max_records: u32,
}

fn validate_with(raw: &RawQuery, spans: &TimespanTable) -> Result<GdeltParams, ProxyError> {
    let query = sanitize_query(raw.require("query")?);
    if query.is_empty() {
        return Err(ProxyError::MissingParameter("query"));
    }
    Ok(GdeltParams {
        query,
        timespan: spans.resolve(raw.get("timespan")),
        max_records: MAX_RECORDS.apply(raw.first(&["maxrecords", "max", "maxRecords"])),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub title: String,
    pub date: String,
    pub source: String,
    pub url: String,
    pub language: String,
    pub country: String,
    pub image: String,
}

impl Article {
    pub fn from_record(r: &Value) -> Self {
        Self {
            title: pick_str(r, &["title"]),
            date: pick_str(r, &["seendate", "date"]),
            source: pick_str(r, &["domain", "source"]),
            url: pick_str(r, &["url", "url_mobile"]),
            language: pick_str(r, &["language"]),
            country: pick_str(r, &["sourcecountry", "country"]),
            image: pick_str(r, &["socialimage", "image"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleList {
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clip {
    pub station: String,
    pub show: String,
    pub date: String,
    pub snippet: String,
    pub url: String,
}

impl Clip {
    pub fn from_record(c: &Value) -> Self {
        Self {
            station: pick_str(c, &["station", "station_name", "stationName", "source"]),
            show: pick_str(c, &["show", "program", "show_name", "showName"]),
            date: pick_str(c, &["date", "startdatetime", "datetime", "dateline", "seendate"]),
            snippet: pick_str(c, &["snippet", "teaser", "context", "caption", "summary"]),
            url: pick_str(c, &["url", "clip", "clipurl", "link", "preview_url"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipList {
    pub clips: Vec<Clip>,
}

pub struct GdeltDoc {
    settings: ProviderSettings,
}

impl GdeltDoc {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

impl Adapter for GdeltDoc {
    type Params = GdeltParams;
    type Output = ArticleList;

    fn name(&self) -> &'static str {
        "gdelt_doc"
    }

    fn label(&self) -> &'static str {
        "GDELT DOC"
    }

    fn validate(&self, raw: &RawQuery) -> Result<GdeltParams, ProxyError> {
        validate_with(raw, &DOC_TIMESPANS)
    }

    fn build(&self, p: &GdeltParams) -> UpstreamQuery {
        let url = UrlBuilder::new(&self.settings.base_url)
            .param("query", &p.query)
            .raw("mode", "artlist")
            .raw("format", "json")
            .raw("sort", "datedesc")
            .param("timespan", &p.timespan)
            .param("maxrecords", p.max_records.to_string())
            .build();
        UpstreamQuery::get(url, self.settings.timeout()).with_header("Accept", ACCEPT)
    }

    fn quirks(&self) -> QuirkTable {
        QUIRKS
    }

    fn normalize(&self, _p: &GdeltParams, body: Value) -> ArticleList {
        ArticleList {
            articles: pick_array(&body, &["articles"])
                .iter()
                .map(Article::from_record)
                .collect(),
        }
    }

    fn contextualize(&self, p: &GdeltParams, err: ProxyError) -> ProxyError {
        err.with_query(&p.query)
    }
}

pub struct GdeltTv {
    settings: ProviderSettings,
}

impl GdeltTv {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

impl Adapter for GdeltTv {
    type Params = GdeltParams;
    type Output = ClipList;

    fn name(&self) -> &'static str {
        "gdelt_tv"
    }

    fn label(&self) -> &'static str {
        "GDELT TV"
    }

    fn validate(&self, raw: &RawQuery) -> Result<GdeltParams, ProxyError> {
        validate_with(raw, &TV_TIMESPANS)
    }

    fn build(&self, p: &GdeltParams) -> UpstreamQuery {
        // The TV API only honours the upper-case TIMESPAN key.
        let url = UrlBuilder::new(&self.settings.base_url)
            .param("query", &p.query)
            .raw("mode", "clipgallery")
            .raw("format", "json")
            .raw("sort", "datedesc")
            .param("TIMESPAN", &p.timespan)
            .param("maxrecords", p.max_records.to_string())
            .build();
        UpstreamQuery::get(url, self.settings.timeout()).with_header("Accept", ACCEPT)
    }

    fn quirks(&self) -> QuirkTable {
        QUIRKS
    }

    fn normalize(&self, _p: &GdeltParams, body: Value) -> ClipList {
        ClipList {
            clips: pick_array(&body, &["clips", "show_clips"])
                .iter()
                .map(Clip::from_record)
                .collect(),
        }
    }

    fn contextualize(&self, p: &GdeltParams, err: ProxyError) -> ProxyError {
        err.with_query(&p.query)
    }
}
