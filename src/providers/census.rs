// src/providers/census.rs
//! Census ACS aggregates by congressional district.
//!
//! `language` walks a fixed chain of tables/vintages and returns the first one
//! that answers; `verify` is a single request.

use serde::Serialize;
use serde_json::Value;

use crate::config::ProviderSettings;
use crate::proxy::classify::{Probe, Quirk, QuirkTable};
use crate::proxy::client::UpstreamQuery;
use crate::proxy::endpoint::{KeyPlacement, UrlBuilder};
use crate::proxy::error::ProxyError;
use crate::proxy::validate::RawQuery;
use crate::proxy::{Adapter, Attempt, Engine};

pub const ACTIONS: &[&str] = &["language", "verify"];
pub const KEY: KeyPlacement = KeyPlacement::Query("key");

// Census wants the geography wildcards unescaped.
const GEO_FOR: &str = "congressional%20district:*";
const GEO_IN: &str = "state:*";

/// A bad key comes back as an HTML page, sometimes with status 200.
pub const QUIRKS: QuirkTable = QuirkTable::new(&[Quirk {
    probe: Probe::TextContainsIgnoreCase("invalid key"),
    status: 403,
    label: "invalid key",
}]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcsTable {
    pub vintage: &'static str,
    pub dataset: &'static str,
    pub variables: &'static str,
    /// Reported back to the caller as `vintage`.
    pub label: &'static str,
    pub table: &'static str,
}

/// Language spoken at home, in priority order.
pub const LANGUAGE_CHAIN: &[AcsTable] = &[
    AcsTable {
        vintage: "2022",
        dataset: "acs/acs5",
        variables: "NAME,C16001_001E,C16001_015E,C16001_017E,C16001_030E,C16001_032E",
        label: "2022",
        table: "C16001",
    },
    AcsTable {
        vintage: "2021",
        dataset: "acs/acs5",
        variables: "NAME,C16001_001E,C16001_015E,C16001_017E,C16001_030E,C16001_032E",
        label: "2021",
        table: "C16001",
    },
    AcsTable {
        vintage: "2023",
        dataset: "acs/acs5",
        variables: "NAME,C16001_001E,C16001_015E,C16001_017E,C16001_030E,C16001_032E",
        label: "2023",
        table: "C16001",
    },
    AcsTable {
        vintage: "2022",
        dataset: "acs/acs5",
        variables: "NAME,B16004_001E,B16004_067E,B16004_068E,B16004_069E",
        label: "2022-B16004",
        table: "B16004",
    },
    AcsTable {
        vintage: "2022",
        dataset: "acs/acs5/profile",
        variables: "NAME,DP02_0113E,DP02_0114E",
        label: "2022-DP02",
        table: "DP02",
    },
];

/// Asian Indian alone, used to check the published district counts.
pub const VERIFY_TABLE: AcsTable = AcsTable {
    vintage: "2022",
    dataset: "acs/acs5",
    variables: "NAME,B02015_002E",
    label: "2022",
    table: "B02015",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CensusAction {
    Language,
    Verify,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusParams {
    pub action: CensusAction,
    pub api_key: String,
}

/// Table payload (rows of strings, header first) is passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CensusTable {
    pub data: Value,
    pub vintage: String,
    pub table: String,
}

pub struct Census {
    settings: ProviderSettings,
}

impl Census {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    pub fn table_query(&self, t: &AcsTable, api_key: &str) -> UpstreamQuery {
        let base = format!("{}/{}/{}", self.settings.base_url, t.vintage, t.dataset);
        let url = UrlBuilder::new(&base)
            .param("get", t.variables)
            .raw("for", GEO_FOR)
            .raw("in", GEO_IN)
            .credential(KEY, api_key)
            .build();
        UpstreamQuery::get(url, self.settings.timeout())
    }

    pub fn language_attempts(&self, api_key: &str) -> Vec<Attempt> {
        LANGUAGE_CHAIN
            .iter()
            .map(|t| Attempt {
                label: t.label.to_string(),
                query: self.table_query(t, api_key),
            })
            .collect()
    }

    pub async fn handle(&self, engine: &Engine, raw: &RawQuery) -> Result<CensusTable, ProxyError> {
        let params = engine.admit(self, raw)?;
        match params.action {
            CensusAction::Verify => engine.execute(self, &params).await,
            CensusAction::Language => {
                let attempts = self.language_attempts(&params.api_key);
                match engine.first_success(self.name(), &attempts, &QUIRKS).await {
                    Ok((label, data)) => {
                        let table = LANGUAGE_CHAIN
                            .iter()
                            .find(|t| t.label == label)
                            .map(|t| t.table)
                            .unwrap_or_default();
                        Ok(CensusTable {
                            data,
                            vintage: label,
                            table: table.to_string(),
                        })
                    }
                    Err(attempts) => Err(ProxyError::FallbackExhausted {
                        message: "All Census language tables returned errors",
                        attempts,
                    }),
                }
            }
        }
    }
}

/// Single-request path (`verify`). `language` goes through [`Census::handle`].
impl Adapter for Census {
    type Params = CensusParams;
    type Output = CensusTable;

    fn name(&self) -> &'static str {
        "census"
    }

    fn label(&self) -> &'static str {
        "Census API"
    }

    fn validate(&self, raw: &RawQuery) -> Result<CensusParams, ProxyError> {
        let action = match raw.selector("action", None, ACTIONS)? {
            "language" => CensusAction::Language,
            _ => CensusAction::Verify,
        };
        let api_key = self
            .settings
            .resolve_key(raw.get("api_key"))
            .ok_or(ProxyError::MissingParameter("api_key"))?;
        Ok(CensusParams { action, api_key })
    }

    fn build(&self, p: &CensusParams) -> UpstreamQuery {
        self.table_query(&VERIFY_TABLE, &p.api_key)
    }

    fn quirks(&self) -> QuirkTable {
        QUIRKS
    }

    fn normalize(&self, _p: &CensusParams, body: Value) -> CensusTable {
        CensusTable {
            data: body,
            vintage: VERIFY_TABLE.label.to_string(),
            table: VERIFY_TABLE.table.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;

    fn census() -> Census {
        Census::new(ProxyConfig::default().census)
    }

    #[test]
    fn table_query_keeps_wildcards_literal() {
        let q = census().table_query(&VERIFY_TABLE, "KEY");
        assert_eq!(
            q.url,
            "https://api.census.gov/data/2022/acs/acs5?get=NAME%2CB02015_002E&for=congressional%20district:*&in=state:*&key=KEY"
        );
    }

    #[test]
    fn language_chain_order_is_fixed() {
        let labels: Vec<String> = census()
            .language_attempts("k")
            .into_iter()
            .map(|a| a.label)
            .collect();
        assert_eq!(labels, ["2022", "2021", "2023", "2022-B16004", "2022-DP02"]);
        let last = &census().language_attempts("k")[4];
        assert!(last.query.url.contains("/2022/acs/acs5/profile?get=NAME%2CDP02_0113E"));
    }

    #[test]
    fn action_is_required_and_checked() {
        let c = census();
        let mut with_key = ProxyConfig::default().census;
        with_key.api_key = Some("env-key".into());
        let keyed = Census::new(with_key);

        assert!(matches!(
            keyed.validate(&RawQuery::default()),
            Err(ProxyError::MissingParameter("action"))
        ));
        assert!(matches!(
            keyed.validate(&RawQuery::from_pairs([("action", "income")])),
            Err(ProxyError::InvalidSelector { .. })
        ));
        let p = keyed
            .validate(&RawQuery::from_pairs([("action", "Verify")]))
            .unwrap();
        assert_eq!(p.action, CensusAction::Verify);
        assert_eq!(p.api_key, "env-key");

        // No configured key and none supplied.
        assert!(matches!(
            c.validate(&RawQuery::from_pairs([("action", "language")])),
            Err(ProxyError::MissingParameter("api_key"))
        ));
    }
}
