// src/providers/congress.rs
//! Congress.gov bill search, newest updates first.

use serde::Serialize;
use serde_json::Value;

use crate::config::ProviderSettings;
use crate::proxy::client::UpstreamQuery;
use crate::proxy::endpoint::{KeyPlacement, UrlBuilder};
use crate::proxy::error::ProxyError;
use crate::proxy::normalize::{pick_array, pick_cursor, pick_str};
use crate::proxy::validate::{Clamp, RawQuery};
use crate::proxy::Adapter;

pub const LIMIT: Clamp = Clamp::new(1, 250, 20);

pub const KEY: KeyPlacement = KeyPlacement::QueryAndHeader {
    param: "api_key",
    header: "X-Api-Key",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CongressParams {
    pub query: String,
    pub limit: u32,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub congress: String,
    #[serde(rename = "type")]
    pub bill_type: String,
    pub number: String,
    pub title: String,
    pub origin_chamber: String,
    pub latest_action: String,
    pub action_date: String,
    pub update_date: String,
    pub url: String,
}

impl Bill {
    pub fn from_record(r: &Value) -> Self {
        Self {
            congress: pick_str(r, &["congress"]),
            bill_type: pick_str(r, &["type", "billType"]),
            number: pick_str(r, &["number", "billNumber"]),
            title: pick_str(r, &["title"]),
            origin_chamber: pick_str(r, &["originChamber", "originChamberCode"]),
            latest_action: pick_str(r, &["/latestAction/text"]),
            action_date: pick_str(r, &["/latestAction/actionDate"]),
            update_date: pick_str(r, &["updateDate", "updateDateIncludingText"]),
            url: pick_str(r, &["url"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillPage {
    pub bills: Vec<Bill>,
    /// Upstream pagination link, passed through untouched.
    pub next: Option<Value>,
}

pub struct Congress {
    settings: ProviderSettings,
}

impl Congress {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

impl Adapter for Congress {
    type Params = CongressParams;
    type Output = BillPage;

    fn name(&self) -> &'static str {
        "congress"
    }

    fn label(&self) -> &'static str {
        "Congress API"
    }

    fn validate(&self, raw: &RawQuery) -> Result<CongressParams, ProxyError> {
        let query = raw.require("q")?.to_string();
        let api_key = self
            .settings
            .resolve_key(raw.get("api_key"))
            .ok_or(ProxyError::MissingParameter("api_key"))?;
        Ok(CongressParams {
            query,
            limit: LIMIT.apply(raw.get("limit")),
            api_key,
        })
    }

    fn build(&self, p: &CongressParams) -> UpstreamQuery {
        let url = UrlBuilder::new(&self.settings.base_url)
            .param("query", &p.query)
            .param("limit", p.limit.to_string())
            .raw("sort", "updateDate+desc")
            .raw("format", "json")
            .credential(KEY, &p.api_key)
            .build();
        let mut q = UpstreamQuery::get(url, self.settings.timeout());
        if let Some(h) = KEY.header_name() {
            q = q.with_header(h, &p.api_key);
        }
        q
    }

    fn normalize(&self, _p: &CongressParams, body: Value) -> BillPage {
        BillPage {
            bills: pick_array(&body, &["bills"])
                .iter()
                .map(Bill::from_record)
                .collect(),
            next: pick_cursor(&body, &["/pagination/next"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use serde_json::json;

    fn congress() -> Congress {
        let mut s = ProxyConfig::default().congress;
        s.api_key = Some("CK".into());
        Congress::new(s)
    }

    #[test]
    fn key_goes_in_query_and_header() {
        let c = congress();
        let p = c
            .validate(&RawQuery::from_pairs([("q", "farm bill"), ("limit", "900")]))
            .unwrap();
        assert_eq!(p.limit, 250);
        let q = c.build(&p);
        assert_eq!(
            q.url,
            "https://api.congress.gov/v3/bill?query=farm%20bill&limit=250&sort=updateDate+desc&format=json&api_key=CK"
        );
        assert_eq!(q.header("x-api-key"), Some("CK"));
    }

    #[test]
    fn caller_key_overrides_configured_key() {
        let c = congress();
        let p = c
            .validate(&RawQuery::from_pairs([("q", "x"), ("api_key", "mine")]))
            .unwrap();
        assert_eq!(p.api_key, "mine");
        assert_eq!(p.limit, 20);
    }

    #[test]
    fn q_is_required() {
        assert!(matches!(
            congress().validate(&RawQuery::from_pairs([("q", "  ")])),
            Err(ProxyError::MissingParameter("q"))
        ));
    }

    #[test]
    fn bills_are_flattened() {
        let c = congress();
        let p = c.validate(&RawQuery::from_pairs([("q", "x")])).unwrap();
        let body = json!({
            "bills": [{
                "congress": 118,
                "type": "HR",
                "number": "815",
                "title": "Making emergency supplemental appropriations",
                "originChamber": "House",
                "latestAction": {"actionDate": "2024-04-24", "text": "Became Public Law No: 118-50."},
                "updateDate": "2024-05-01",
                "url": "https://api.congress.gov/v3/bill/118/hr/815?format=json"
            }],
            "pagination": {"count": 1, "next": "https://api.congress.gov/v3/bill?offset=20"}
        });
        let page = c.normalize(&p, body);
        assert_eq!(page.bills.len(), 1);
        let b = &page.bills[0];
        assert_eq!(b.congress, "118");
        assert_eq!(b.latest_action, "Became Public Law No: 118-50.");
        assert_eq!(b.action_date, "2024-04-24");
        assert_eq!(page.next, Some(json!("https://api.congress.gov/v3/bill?offset=20")));

        let v = serde_json::to_value(b).unwrap();
        assert_eq!(v["type"], "HR");
        assert_eq!(v["originChamber"], "House");
    }

    #[test]
    fn missing_pagination_is_null_next() {
        let c = congress();
        let p = c.validate(&RawQuery::from_pairs([("q", "x")])).unwrap();
        let page = c.normalize(&p, json!({}));
        assert!(page.bills.is_empty());
        assert_eq!(serde_json::to_value(&page).unwrap()["next"], Value::Null);
    }
}
