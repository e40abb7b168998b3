//! Configuration data structures for Verge.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files
//! and to `EDGE_`-prefixed environment variables. They are intentionally
//! serde-friendly and include defaults so that a config file is optional:
//! every knob has a hardcoded default.
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the edge router.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EdgeConfig {
    /// Address the edge server listens on
    pub listen_addr: String,
    /// Origin endpoints the edge fronts
    pub origin: OriginConfig,
    /// Shared response cache tuning
    pub cache: CacheConfig,
    /// Sitemap replica tuning
    pub sitemap: SitemapConfig,
    /// Scheduled refresher tuning
    pub refresh: RefreshConfig,
    /// Site identity used for hydration and sitemap locs
    pub site: SiteConfig,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            origin: OriginConfig::default(),
            cache: CacheConfig::default(),
            sitemap: SitemapConfig::default(),
            refresh: RefreshConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

/// Origin endpoints. The backend API is an opaque HTTP origin; the frontend
/// base serves the static bundle (SPA shell, assets, materialized documents).
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OriginConfig {
    /// Base URL of the backend content/market-data API
    pub api_base: String,
    /// Base URL of the frontend static-asset store
    pub frontend_base: String,
    /// Per-request origin fetch timeout in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.example.com".to_string(),
            frontend_base: "https://static.example.com".to_string(),
            fetch_timeout_secs: 5,
        }
    }
}

impl OriginConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// TTLs for the shared edge cache.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for HTML page entries (freshness-first, short)
    pub page_ttl_secs: u64,
    /// TTL for immutable asset entries (content-addressed, long)
    pub asset_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_ttl_secs: 3600,
            asset_ttl_secs: 31_536_000,
        }
    }
}

impl CacheConfig {
    pub fn page_ttl(&self) -> Duration {
        Duration::from_secs(self.page_ttl_secs)
    }

    pub fn asset_ttl(&self) -> Duration {
        Duration::from_secs(self.asset_ttl_secs)
    }
}

/// Sitemap replica settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SitemapConfig {
    /// Public path of the statically generated root sitemap
    pub static_sitemap: String,
    /// KV TTL for replicated chunk entries, in seconds
    pub chunk_ttl_secs: u64,
    /// Cache-Control max-age advertised on sitemap responses
    pub response_max_age_secs: u64,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            static_sitemap: "/sitemap-static.xml".to_string(),
            chunk_ttl_secs: 86_400,
            response_max_age_secs: 3600,
        }
    }
}

impl SitemapConfig {
    pub fn chunk_ttl(&self) -> Duration {
        Duration::from_secs(self.chunk_ttl_secs)
    }
}

/// Scheduled refresher settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
    /// Whether the background refresher runs at all
    pub enabled: bool,
    /// Cadence of refresh cycles, in seconds
    pub interval_secs: u64,
    /// KV TTL for the sitemap meta record; kept slightly longer than the
    /// interval so one missed tick stays invisible to readers
    pub meta_ttl_secs: u64,
    /// Number of chunks refreshed per cycle
    pub batch_size: usize,
    /// Origin fetches per second during a cycle
    pub origin_rps: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            meta_ttl_secs: 4500,
            batch_size: 5,
            origin_rps: 2,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn meta_ttl(&self) -> Duration {
        Duration::from_secs(self.meta_ttl_secs)
    }
}

/// Site identity strings used by hydration and sitemap synthesis.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SiteConfig {
    /// Display name appended to rewritten titles
    pub name: String,
    /// Canonical public base URL of the site
    pub public_base: String,
    /// Parent organization URL embedded in the JSON-LD block
    pub parent_org_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Example Markets".to_string(),
            public_base: "https://www.example.com".to_string(),
            parent_org_url: "https://www.example-holdings.com".to_string(),
        }
    }
}
