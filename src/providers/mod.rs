// src/providers/mod.rs
//! Upstream adapters, one module per provider.

pub mod census;
pub mod congress;
pub mod gdelt;
pub mod govinfo;
pub mod snippet;
pub mod youtube;

use crate::config::ProxyConfig;

pub use census::Census;
pub use congress::Congress;
pub use gdelt::{GdeltDoc, GdeltTv};
pub use govinfo::Govinfo;
pub use youtube::Youtube;

/// Every adapter, built once from the resolved configuration.
pub struct Providers {
    pub gdelt_doc: GdeltDoc,
    pub gdelt_tv: GdeltTv,
    pub govinfo: Govinfo,
    pub census: Census,
    pub congress: Congress,
    pub youtube: Youtube,
}

impl Providers {
    pub fn from_config(cfg: &ProxyConfig) -> Self {
        Self {
            gdelt_doc: GdeltDoc::new(cfg.gdelt_doc.clone()),
            gdelt_tv: GdeltTv::new(cfg.gdelt_tv.clone()),
            govinfo: Govinfo::new(cfg.govinfo.clone(), cfg.enrichment),
            census: Census::new(cfg.census.clone()),
            congress: Congress::new(cfg.congress.clone()),
            youtube: Youtube::new(cfg.youtube.clone()),
        }
    }
}
