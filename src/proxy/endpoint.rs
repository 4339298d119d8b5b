// src/proxy/endpoint.rs
//! Upstream URL assembly and credential placement.

use url::Url;

/// Where a provider expects its API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPlacement {
    /// Public API, no key.
    None,
    /// Query-string parameter only.
    Query(&'static str),
    /// Request header only.
    Header(&'static str),
    /// Both a query-string parameter and a header.
    QueryAndHeader {
        param: &'static str,
        header: &'static str,
    },
}

impl KeyPlacement {
    pub fn query_param(&self) -> Option<&'static str> {
        match self {
            KeyPlacement::Query(p) | KeyPlacement::QueryAndHeader { param: p, .. } => Some(p),
            _ => None,
        }
    }

    pub fn header_name(&self) -> Option<&'static str> {
        match self {
            KeyPlacement::Header(h) | KeyPlacement::QueryAndHeader { header: h, .. } => Some(h),
            _ => None,
        }
    }
}

/// Builds `base?k=v&...` with every value percent-encoded exactly once.
///
/// Values that the provider requires verbatim (a literal `*` wildcard, a
/// `+` inside a sort spec) go through [`UrlBuilder::raw`] instead.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    buf: String,
    has_query: bool,
}

impl UrlBuilder {
    pub fn new(base: &str) -> Self {
        Self {
            has_query: base.contains('?'),
            buf: base.to_string(),
        }
    }

    /// Append `key=<encoded value>`.
    pub fn param(self, key: &str, value: impl AsRef<str>) -> Self {
        let encoded = urlencoding::encode(value.as_ref()).into_owned();
        self.push(key, &encoded)
    }

    /// Append `key=value` without touching the value.
    pub fn raw(self, key: &str, value: &str) -> Self {
        self.push(key, value)
    }

    /// Append the key as a query parameter if the placement wants one.
    pub fn credential(self, placement: KeyPlacement, key: &str) -> Self {
        match placement.query_param() {
            Some(p) if !key.is_empty() => self.param(p, key),
            _ => self,
        }
    }

    pub fn build(self) -> String {
        self.buf
    }

    fn push(mut self, key: &str, value: &str) -> Self {
        self.buf.push(if self.has_query { '&' } else { '?' });
        self.has_query = true;
        self.buf.push_str(key);
        self.buf.push('=');
        self.buf.push_str(value);
        self
    }
}

/// Remove any `api_key` parameter from a link before it is handed to a browser.
/// Unparseable input is returned as-is.
pub fn strip_api_key(link: &str) -> String {
    if link.is_empty() {
        return String::new();
    }
    let Ok(mut url) = Url::parse(link) else {
        return link.to_string();
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "api_key")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.to_string()
}

/// Add `api_key` to a link unless it already carries one.
pub fn ensure_api_key(link: &str, api_key: &str) -> String {
    if link.is_empty() {
        return String::new();
    }
    match Url::parse(link) {
        Ok(mut url) => {
            let present = url
                .query_pairs()
                .any(|(k, v)| k == "api_key" && !v.is_empty());
            if !present {
                url.query_pairs_mut().append_pair("api_key", api_key);
            }
            url.to_string()
        }
        Err(_) => {
            let sep = if link.contains('?') { '&' } else { '?' };
            format!("{link}{sep}api_key={}", urlencoding::encode(api_key))
        }
    }
}
