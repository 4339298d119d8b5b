// src/providers/snippet.rs
//! Markup stripping, needle extraction and windowed snippets for enrichment.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const MAX_NEEDLES: usize = 8;

/// Boolean operators, field names and collection vocabulary: never useful as needles.
const STOPWORDS: &[&str] = &[
    "and", "or", "not", "collection", "crec", "docclass", "house", "senate",
];

static RE_SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<script.*?</script>").expect("script regex"));
static RE_STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style.*?</style>").expect("style regex"));
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9-]{2,}").expect("token regex"));

/// Drop scripts, styles and tags, decode entities, collapse whitespace.
pub fn strip_html(s: &str) -> String {
    let out = RE_SCRIPT.replace_all(s, " ");
    let out = RE_STYLE.replace_all(&out, " ");
    let out = RE_TAGS.replace_all(&out, " ");
    let out = html_escape::decode_html_entities(&out);
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// Up to 8 distinct lower-cased terms of 3+ chars from the caller's query.
pub fn extract_needles(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    RE_TOKEN
        .find_iter(query)
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .take(MAX_NEEDLES)
        .collect()
}

/// A `width`-char window centred on the first needle hit (needles tried in
/// order), with `…` where text was cut. No hit: the first `width` chars.
pub fn make_snippet(text: &str, needles: &[String], width: usize) -> String {
    let t = RE_WS.replace_all(text, " ");
    let t = t.trim();
    if t.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = t.chars().collect();
    // ASCII lowering keeps byte offsets aligned with `t`.
    let lower = t.to_ascii_lowercase();

    let hit = needles
        .iter()
        .filter(|n| !n.is_empty())
        .find_map(|n| lower.find(n.as_str()));

    let Some(byte_idx) = hit else {
        return chars.iter().take(width).collect();
    };

    let idx = t[..byte_idx].chars().count();
    let start = idx.saturating_sub(width / 2);
    let end = (start + width).min(chars.len());

    let mut out = String::with_capacity(width + 8);
    if start > 0 {
        out.push('…');
    }
    out.extend(&chars[start..end]);
    if end < chars.len() {
        out.push('…');
    }
    out
}
