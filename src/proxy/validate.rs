// src/proxy/validate.rs
//! Query-string validation: required params, selectors, numeric clamps, time windows.

use std::collections::HashMap;

use super::error::ProxyError;

/// Raw query-string parameters as received from the caller.
#[derive(Debug, Clone, Default)]
pub struct RawQuery(HashMap<String, String>);

impl RawQuery {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self(map)
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Trimmed value; empty counts as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// First present value among aliases.
    pub fn first(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn require(&self, key: &'static str) -> Result<&str, ProxyError> {
        self.get(key).ok_or(ProxyError::MissingParameter(key))
    }

    /// Selector value checked case-insensitively against `valid`. An absent value
    /// takes `default`, or is reported missing when there is none.
    pub fn selector(
        &self,
        key: &'static str,
        default: Option<&'static str>,
        valid: &'static [&'static str],
    ) -> Result<&'static str, ProxyError> {
        let raw = match (self.get(key), default) {
            (Some(v), _) => v.to_ascii_lowercase(),
            (None, Some(d)) => return Ok(d),
            (None, None) => return Err(ProxyError::MissingParameter(key)),
        };
        valid
            .iter()
            .copied()
            .find(|v| v.eq_ignore_ascii_case(&raw))
            .ok_or(ProxyError::InvalidSelector {
                param: key,
                value: raw,
                valid,
            })
    }
}

/// Inclusive integer range with a default for absent or non-numeric input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clamp {
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

impl Clamp {
    pub const fn new(min: u32, max: u32, default: u32) -> Self {
        Self { min, max, default }
    }

    /// Parses a leading (optionally signed) integer, ignoring trailing junk,
    /// so `"25abc"` reads as 25. Anything without leading digits gets the default.
    pub fn apply(&self, raw: Option<&str>) -> u32 {
        let Some(s) = raw.map(str::trim) else {
            return self.default;
        };
        let (negative, rest) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let digits: &str = {
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            &rest[..end]
        };
        if digits.is_empty() {
            return self.default;
        }
        let n: i64 = digits.parse().unwrap_or(i64::MAX);
        let n = if negative { -n } else { n };
        n.clamp(self.min as i64, self.max as i64) as u32
    }
}

/// Per-provider time-window vocabulary.
///
/// Lookup order: canonical token table, then `custom` conversion of
/// `<number><unit>` tokens, then `fallback`.
#[derive(Clone, Copy)]
pub struct TimespanTable {
    pub entries: &'static [(&'static str, &'static str)],
    pub custom: fn(&str) -> Option<String>,
    pub fallback: &'static str,
}

impl TimespanTable {
    pub fn resolve(&self, raw: Option<&str>) -> String {
        let token = raw.unwrap_or_default().trim().to_ascii_lowercase();
        let key = canonical_window(&token);
        if let Some((_, v)) = self.entries.iter().find(|(k, _)| *k == key) {
            return (*v).to_string();
        }
        (self.custom)(&token).unwrap_or_else(|| self.fallback.to_string())
    }
}

/// Spelled-out windows the dashboard sends, folded onto the short tokens.
fn canonical_window(t: &str) -> &str {
    match t {
        "1 month" | "1month" | "month" => "1m",
        "3 months" | "3months" => "3m",
        "6 months" | "6months" => "6m",
        "1 year" | "1year" | "year" | "12 months" => "1y",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_treats_blank_as_missing() {
        let q = RawQuery::from_pairs([("query", "   ")]);
        assert!(matches!(
            q.require("query"),
            Err(ProxyError::MissingParameter("query"))
        ));
        let q = RawQuery::from_pairs([("query", " tariffs ")]);
        assert_eq!(q.require("query").unwrap(), "tariffs");
    }

    #[test]
    fn first_picks_alias_in_order() {
        let q = RawQuery::from_pairs([("max", "10"), ("maxRecords", "20")]);
        assert_eq!(q.first(&["maxrecords", "max", "maxRecords"]), Some("10"));
    }

    #[test]
    fn selector_defaults_normalizes_and_rejects() {
        const VALID: &[&str] = &["doc", "tv"];
        let q = RawQuery::default();
        assert_eq!(q.selector("source", Some("doc"), VALID).unwrap(), "doc");
        assert!(matches!(
            q.selector("source", None, VALID),
            Err(ProxyError::MissingParameter("source"))
        ));

        let q = RawQuery::from_pairs([("source", "TV")]);
        assert_eq!(q.selector("source", Some("doc"), VALID).unwrap(), "tv");

        let q = RawQuery::from_pairs([("source", "radio")]);
        match q.selector("source", Some("doc"), VALID) {
            Err(ProxyError::InvalidSelector { value, .. }) => assert_eq!(value, "radio"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn clamp_handles_range_default_and_junk() {
        let c = Clamp::new(1, 250, 50);
        assert_eq!(c.apply(None), 50);
        assert_eq!(c.apply(Some("")), 50);
        assert_eq!(c.apply(Some("abc")), 50);
        assert_eq!(c.apply(Some("NaN")), 50);
        assert_eq!(c.apply(Some("0")), 1);
        assert_eq!(c.apply(Some("-7")), 1);
        assert_eq!(c.apply(Some("251")), 250);
        assert_eq!(c.apply(Some("99999999999999999999999")), 250);
        assert_eq!(c.apply(Some("75")), 75);
        assert_eq!(c.apply(Some(" 30abc")), 30);
        assert_eq!(c.apply(Some("+12")), 12);
        assert_eq!(c.apply(Some("-")), 50);
    }

    #[test]
    fn timespan_table_lookup_custom_and_fallback() {
        fn days(t: &str) -> Option<String> {
            t.strip_suffix('d')
                .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                .map(|n| format!("{n}d"))
        }
        let table = TimespanTable {
            entries: &[("1m", "30d"), ("1y", "365d")],
            custom: days,
            fallback: "30d",
        };
        assert_eq!(table.resolve(Some("1M")), "30d");
        assert_eq!(table.resolve(Some("1 year")), "365d");
        assert_eq!(table.resolve(Some("12d")), "12d");
        assert_eq!(table.resolve(Some("forever")), "30d");
        assert_eq!(table.resolve(None), "30d");
    }
}
