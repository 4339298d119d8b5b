// src/providers/youtube.rs
//! YouTube Data v3: video search with a statistics side-lookup, and direct
//! statistics by id.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::ProviderSettings;
use crate::proxy::classify::{Probe, Quirk, QuirkTable};
use crate::proxy::client::UpstreamQuery;
use crate::proxy::endpoint::{KeyPlacement, UrlBuilder};
use crate::proxy::error::ProxyError;
use crate::proxy::normalize::{pick_array, pick_str};
use crate::proxy::validate::{Clamp, RawQuery};
use crate::proxy::{Adapter, Engine};

pub const ACTIONS: &[&str] = &["search", "stats"];
pub const ORDERS: &[&str] = &["date", "rating", "relevance", "title", "videoCount", "viewCount"];
pub const MAX_RESULTS: Clamp = Clamp::new(1, 50, 15);
pub const MAX_IDS: usize = 50;
pub const KEY: KeyPlacement = KeyPlacement::Query("key");

const MESSAGE: &str = "/error/message";

/// Google sometimes wraps a failure in a 200 envelope.
pub const QUIRKS: QuirkTable = QuirkTable::new(&[Quirk {
    probe: Probe::JsonPointer("/error"),
    status: 502,
    label: "error envelope",
}]);

static RE_VIDEO_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("video id regex"));

pub fn is_video_id(s: &str) -> bool {
    RE_VIDEO_ID.is_match(s)
}

/// Comma-separated ids, blanks dropped. Every id must look like a video id.
pub fn parse_ids(raw: &str) -> Result<Vec<String>, ProxyError> {
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(ProxyError::MissingParameter("ids"));
    }
    if ids.len() > MAX_IDS {
        return Err(ProxyError::InvalidParameter {
            param: "ids",
            reason: format!("at most {MAX_IDS} ids per request"),
        });
    }
    if let Some(bad) = ids.iter().find(|id| !is_video_id(id)) {
        return Err(ProxyError::InvalidParameter {
            param: "ids",
            reason: format!("not a video id: {bad}"),
        });
    }
    Ok(ids)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YoutubeRequest {
    Search {
        query: String,
        order: &'static str,
        max_results: u32,
    },
    Stats {
        ids: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YoutubeParams {
    pub request: YoutubeRequest,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub channel_id: String,
    pub published_at: String,
    pub description: String,
    pub thumbnail: String,
    pub url: String,
}

impl Video {
    pub fn from_record(r: &Value) -> Self {
        let id = pick_str(r, &["/id/videoId", "id"]);
        let url = if id.is_empty() {
            String::new()
        } else {
            format!("https://www.youtube.com/watch?v={id}")
        };
        Self {
            title: pick_str(r, &["/snippet/title"]),
            channel: pick_str(r, &["/snippet/channelTitle"]),
            channel_id: pick_str(r, &["/snippet/channelId"]),
            published_at: pick_str(r, &["/snippet/publishedAt"]),
            description: pick_str(r, &["/snippet/description"]),
            thumbnail: pick_str(
                r,
                &[
                    "/snippet/thumbnails/high/url",
                    "/snippet/thumbnails/medium/url",
                    "/snippet/thumbnails/default/url",
                ],
            ),
            id,
            url,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub view_count: String,
    pub like_count: String,
    pub comment_count: String,
    pub duration: String,
}

impl Statistics {
    pub fn from_record(r: &Value) -> Self {
        Self {
            view_count: pick_str(r, &["/statistics/viewCount"]),
            like_count: pick_str(r, &["/statistics/likeCount"]),
            comment_count: pick_str(r, &["/statistics/commentCount"]),
            duration: pick_str(r, &["/contentDetails/duration"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoStats {
    pub id: String,
    #[serde(flatten)]
    pub stats: Statistics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum YoutubeResponse {
    Search {
        items: Vec<Video>,
        stats: BTreeMap<String, Statistics>,
    },
    Stats {
        items: Vec<VideoStats>,
    },
}

fn stats_map(body: &Value) -> BTreeMap<String, Statistics> {
    pick_array(body, &["items"])
        .iter()
        .filter_map(|v| {
            let id = pick_str(v, &["id"]);
            (!id.is_empty()).then(|| (id, Statistics::from_record(v)))
        })
        .collect()
}

pub struct Youtube {
    settings: ProviderSettings,
}

impl Youtube {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    pub fn stats_query(&self, ids: &[String], api_key: &str) -> UpstreamQuery {
        let url = UrlBuilder::new(&format!("{}/videos", self.settings.base_url))
            .raw("part", "statistics,contentDetails")
            .raw("id", &ids.join(","))
            .credential(KEY, api_key)
            .build();
        UpstreamQuery::get(url, self.settings.timeout())
    }

    /// Search, then attach per-video statistics. A failed statistics lookup
    /// leaves `stats` empty instead of failing the search.
    pub async fn handle(&self, engine: &Engine, raw: &RawQuery) -> Result<YoutubeResponse, ProxyError> {
        let params = engine.admit(self, raw)?;
        let mut out = engine.execute(self, &params).await?;

        if let YoutubeResponse::Search { items, stats } = &mut out {
            let ids: Vec<String> = items
                .iter()
                .map(|v| v.id.clone())
                .filter(|id| is_video_id(id))
                .take(MAX_IDS)
                .collect();
            if !ids.is_empty() {
                let query = self.stats_query(&ids, &params.api_key);
                match engine
                    .fetch_json("youtube_stats", self.label(), &query, &QUIRKS)
                    .await
                {
                    Ok(body) => *stats = stats_map(&body),
                    Err(e) => {
                        tracing::warn!(provider = "youtube", error = %e, videos = ids.len(), "statistics lookup failed, returning search without stats");
                    }
                }
            }
        }
        Ok(out)
    }
}

impl Adapter for Youtube {
    type Params = YoutubeParams;
    type Output = YoutubeResponse;

    fn name(&self) -> &'static str {
        "youtube"
    }

    fn label(&self) -> &'static str {
        "YouTube API"
    }

    fn validate(&self, raw: &RawQuery) -> Result<YoutubeParams, ProxyError> {
        let request = match raw.selector("action", None, ACTIONS)? {
            "search" => YoutubeRequest::Search {
                query: raw.require("q")?.to_string(),
                order: raw.selector("order", Some("relevance"), ORDERS)?,
                max_results: MAX_RESULTS.apply(raw.get("maxResults")),
            },
            _ => YoutubeRequest::Stats {
                ids: parse_ids(raw.require("ids")?)?,
            },
        };
        let api_key = self
            .settings
            .resolve_key(raw.get("api_key"))
            .ok_or(ProxyError::MissingParameter("api_key"))?;
        Ok(YoutubeParams { request, api_key })
    }

    fn build(&self, p: &YoutubeParams) -> UpstreamQuery {
        match &p.request {
            YoutubeRequest::Search {
                query,
                order,
                max_results,
            } => {
                let url = UrlBuilder::new(&format!("{}/search", self.settings.base_url))
                    .raw("part", "snippet")
                    .raw("type", "video")
                    .param("maxResults", max_results.to_string())
                    .param("order", order)
                    .param("q", query)
                    .credential(KEY, &p.api_key)
                    .build();
                UpstreamQuery::get(url, self.settings.timeout())
            }
            YoutubeRequest::Stats { ids } => self.stats_query(ids, &p.api_key),
        }
    }

    fn quirks(&self) -> QuirkTable {
        QUIRKS
    }

    fn normalize(&self, p: &YoutubeParams, body: Value) -> YoutubeResponse {
        match p.request {
            YoutubeRequest::Search { .. } => YoutubeResponse::Search {
                items: pick_array(&body, &["items"])
                    .iter()
                    .map(Video::from_record)
                    .collect(),
                stats: BTreeMap::new(),
            },
            YoutubeRequest::Stats { .. } => YoutubeResponse::Stats {
                items: pick_array(&body, &["items"])
                    .iter()
                    .map(|v| VideoStats {
                        id: pick_str(v, &["id"]),
                        stats: Statistics::from_record(v),
                    })
                    .collect(),
            },
        }
    }

    fn contextualize(&self, _p: &YoutubeParams, err: ProxyError) -> ProxyError {
        err.with_upstream_message(MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use serde_json::json;

    fn youtube() -> Youtube {
        let mut s = ProxyConfig::default().youtube;
        s.api_key = Some("YK".into());
        Youtube::new(s)
    }

    #[test]
    fn search_query_defaults() {
        let y = youtube();
        let p = y
            .validate(&RawQuery::from_pairs([("action", "search"), ("q", "town hall")]))
            .unwrap();
        assert_eq!(
            p.request,
            YoutubeRequest::Search {
                query: "town hall".into(),
                order: "relevance",
                max_results: 15
            }
        );
        assert_eq!(
            y.build(&p).url,
            "https://www.googleapis.com/youtube/v3/search?part=snippet&type=video&maxResults=15&order=relevance&q=town%20hall&key=YK"
        );
    }

    #[test]
    fn order_is_checked_and_keeps_canonical_case() {
        let y = youtube();
        let p = y
            .validate(&RawQuery::from_pairs([
                ("action", "search"),
                ("q", "x"),
                ("order", "VIEWCOUNT"),
                ("maxResults", "80"),
            ]))
            .unwrap();
        assert!(matches!(
            p.request,
            YoutubeRequest::Search { order: "viewCount", max_results: 50, .. }
        ));
        assert!(matches!(
            y.validate(&RawQuery::from_pairs([("action", "search"), ("q", "x"), ("order", "random")])),
            Err(ProxyError::InvalidSelector { param: "order", .. })
        ));
    }

    #[test]
    fn ids_are_validated() {
        assert_eq!(parse_ids("abc, def_-1 ,").unwrap(), vec!["abc", "def_-1"]);
        assert!(matches!(parse_ids(" , "), Err(ProxyError::MissingParameter("ids"))));
        assert!(matches!(
            parse_ids("abc,d&key=x"),
            Err(ProxyError::InvalidParameter { param: "ids", .. })
        ));
        let many = vec!["a"; 51].join(",");
        assert!(matches!(parse_ids(&many), Err(ProxyError::InvalidParameter { .. })));
        assert_eq!(parse_ids(&vec!["a"; 50].join(",")).unwrap().len(), 50);
    }

    #[test]
    fn stats_query_lists_ids_verbatim() {
        let q = youtube().stats_query(&["a1".into(), "b-2".into()], "YK");
        assert_eq!(
            q.url,
            "https://www.googleapis.com/youtube/v3/videos?part=statistics,contentDetails&id=a1,b-2&key=YK"
        );
    }

    #[test]
    fn search_items_are_normalized() {
        let y = youtube();
        let p = y
            .validate(&RawQuery::from_pairs([("action", "search"), ("q", "x")]))
            .unwrap();
        let body = json!({"items": [{
            "id": {"kind": "youtube#video", "videoId": "vid1"},
            "snippet": {
                "title": "Hearing",
                "channelTitle": "C-SPAN",
                "channelId": "UC1",
                "publishedAt": "2024-01-01T00:00:00Z",
                "description": "d",
                "thumbnails": {"medium": {"url": "https://i.ytimg.com/m.jpg"}}
            }
        }]});
        let YoutubeResponse::Search { items, stats } = y.normalize(&p, body) else {
            panic!("expected search response");
        };
        assert!(stats.is_empty());
        assert_eq!(items[0].id, "vid1");
        assert_eq!(items[0].thumbnail, "https://i.ytimg.com/m.jpg");
        assert_eq!(items[0].url, "https://www.youtube.com/watch?v=vid1");
        let v = serde_json::to_value(&items[0]).unwrap();
        assert_eq!(v["channelId"], "UC1");
        assert_eq!(v["publishedAt"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn stats_flatten_per_video() {
        let body = json!({"items": [
            {"id": "b", "statistics": {"viewCount": "10", "likeCount": "2"}, "contentDetails": {"duration": "PT1M"}},
            {"id": "a", "statistics": {"viewCount": "5", "commentCount": "1"}}
        ]});
        let map = stats_map(&body);
        assert_eq!(map.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(
            serde_json::to_value(&map["b"]).unwrap(),
            json!({"viewCount": "10", "likeCount": "2", "commentCount": "", "duration": "PT1M"})
        );
    }
}
