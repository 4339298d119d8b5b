// src/config/proxy.rs
//! Process-wide proxy configuration, resolved once at startup and read-only afterwards.
//!
//! Layers, later wins:
//! 1) built-in defaults
//! 2) TOML file: $PROXY_CONFIG_PATH, else config/proxy.toml when present
//! 3) environment: CENSUS_KEY, CONGRESS_KEY, YOUTUBE_KEY, PROXY_USER_AGENT, PROXY_TIMEOUT_MS

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "PROXY_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/proxy.toml";

const MIN_TIMEOUT_MS: u64 = 1_000;
const MAX_TIMEOUT_MS: u64 = 60_000;

#[derive(Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub timeout_ms: u64,
    pub api_key: Option<String>,
}

impl ProviderSettings {
    fn new(base_url: &str, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.to_string(),
            timeout_ms,
            api_key: None,
        }
    }

    /// Upstream timeout, clamped into 1..=60 s.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
    }

    /// Caller-supplied key wins over the configured one.
    pub fn resolve_key(&self, caller: Option<&str>) -> Option<String> {
        caller
            .map(str::to_string)
            .or_else(|| self.api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }
}

// Keys must never show up in logs.
impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("key_len", &self.api_key.as_ref().map_or(0, |k| k.len()))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentSettings {
    /// How many primary results get a snippet.
    pub cap: usize,
    /// Simultaneous enrichment tasks.
    pub concurrency: usize,
    /// Snippet window in characters.
    pub snippet_width: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            cap: 10,
            concurrency: 3,
            snippet_width: 240,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub user_agent: String,
    pub gdelt_doc: ProviderSettings,
    pub gdelt_tv: ProviderSettings,
    pub govinfo: ProviderSettings,
    pub census: ProviderSettings,
    pub congress: ProviderSettings,
    pub youtube: ProviderSettings,
    pub enrichment: EnrichmentSettings,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            user_agent: "atlas-proxy/0.1 (+public-data gateway)".to_string(),
            gdelt_doc: ProviderSettings::new("https://api.gdeltproject.org/api/v2/doc/doc", 15_000),
            gdelt_tv: ProviderSettings::new("https://api.gdeltproject.org/api/v2/tv/tv", 15_000),
            govinfo: ProviderSettings::new("https://api.govinfo.gov/search", 20_000),
            census: ProviderSettings::new("https://api.census.gov/data", 20_000),
            congress: ProviderSettings::new("https://api.congress.gov/v3/bill", 15_000),
            youtube: ProviderSettings::new("https://www.googleapis.com/youtube/v3", 15_000),
            enrichment: EnrichmentSettings::default(),
        }
    }
}

// ---- file format: every field optional, merged over defaults ----

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    user_agent: Option<String>,
    gdelt_doc: Option<ProviderOverride>,
    gdelt_tv: Option<ProviderOverride>,
    govinfo: Option<ProviderOverride>,
    census: Option<ProviderOverride>,
    congress: Option<ProviderOverride>,
    youtube: Option<ProviderOverride>,
    enrichment: Option<EnrichmentOverride>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProviderOverride {
    base_url: Option<String>,
    timeout_ms: Option<u64>,
    api_key: Option<String>,
}

impl ProviderOverride {
    fn merge_into(self, s: &mut ProviderSettings) {
        if let Some(v) = self.base_url {
            s.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = self.timeout_ms {
            s.timeout_ms = v;
        }
        if let Some(v) = self.api_key {
            s.api_key = Some(v);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnrichmentOverride {
    cap: Option<usize>,
    concurrency: Option<usize>,
    snippet_width: Option<usize>,
}

impl ProxyConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(s).context("parsing proxy config toml")?;
        let mut cfg = Self::default();
        cfg.merge(file);
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading proxy config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// File (env path, then default path, else built-ins) plus environment overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                Self::load_from(&default_path)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    /// Apply environment overrides through `lookup` (injected for tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("CENSUS_KEY") {
            self.census.api_key = Some(v);
        }
        if let Some(v) = get("CONGRESS_KEY") {
            self.congress.api_key = Some(v);
        }
        if let Some(v) = get("YOUTUBE_KEY") {
            self.youtube.api_key = Some(v);
        }
        if let Some(v) = get("PROXY_USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(ms) = get("PROXY_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            for p in self.providers_mut() {
                p.timeout_ms = ms;
            }
        }
    }

    fn merge(&mut self, file: FileConfig) {
        if let Some(ua) = file.user_agent.filter(|s| !s.trim().is_empty()) {
            self.user_agent = ua;
        }
        let sections = [
            (file.gdelt_doc, &mut self.gdelt_doc),
            (file.gdelt_tv, &mut self.gdelt_tv),
            (file.govinfo, &mut self.govinfo),
            (file.census, &mut self.census),
            (file.congress, &mut self.congress),
            (file.youtube, &mut self.youtube),
        ];
        for (ov, target) in sections {
            if let Some(ov) = ov {
                ov.merge_into(target);
            }
        }
        if let Some(e) = file.enrichment {
            let d = &mut self.enrichment;
            d.cap = e.cap.unwrap_or(d.cap);
            d.concurrency = e.concurrency.unwrap_or(d.concurrency).max(1);
            d.snippet_width = e.snippet_width.unwrap_or(d.snippet_width).max(1);
        }
    }

    fn providers_mut(&mut self) -> [&mut ProviderSettings; 6] {
        [
            &mut self.gdelt_doc,
            &mut self.gdelt_tv,
            &mut self.govinfo,
            &mut self.census,
            &mut self.congress,
            &mut self.youtube,
        ]
    }
}
