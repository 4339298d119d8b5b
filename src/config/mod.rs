// src/config/mod.rs
pub mod proxy;

pub use proxy::{EnrichmentSettings, ProviderSettings, ProxyConfig};
