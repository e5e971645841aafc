/*!
common/src/lib.rs

Shared configuration types, the canonical article model and small helpers for Newsradar.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default/override merging
- Re-exports of the article and watchlist model used by every crate in the workspace
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod model;

pub use model::{Article, FeedSource, MatchField, MatchReason, WatchlistItem};

/// HTTP server configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (e.g. "127.0.0.1")
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Politeness / fetching configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolitenessConfig {
    pub fetch_timeout_seconds: Option<u64>,
    /// Extra attempts on 5xx / 429 responses. 0 means a single attempt.
    pub max_retries: Option<u32>,
    pub user_agent: Option<String>,
}

impl PolitenessConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds.unwrap_or(8).clamp(1, 10))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(0).min(3)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| "Newsradar/0.1.0".to_string())
    }
}

/// In-memory cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for country/category headline batches (default 30 minutes)
    pub headlines_ttl_seconds: Option<u64>,
    /// TTL for search (query-filtered) batches (default 15 minutes)
    pub search_ttl_seconds: Option<u64>,
    /// Soft bound after which stale entries are pruned
    pub max_entries: Option<usize>,
}

impl CacheConfig {
    pub fn headlines_ttl(&self) -> Duration {
        Duration::from_secs(self.headlines_ttl_seconds.unwrap_or(30 * 60))
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_seconds.unwrap_or(15 * 60))
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries.unwrap_or(200)
    }
}

/// Quota override for one rate-limit policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitQuotaConfig {
    pub max_requests: usize,
    pub window_seconds: Option<u64>,
}

/// Rate limiting configuration, one optional override per policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub ai: Option<RateLimitQuotaConfig>,
    pub standard: Option<RateLimitQuotaConfig>,
    pub cached: Option<RateLimitQuotaConfig>,
}

/// Background refresh configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub refresh_interval_minutes: Option<u64>,
    /// Countries whose feeds are refreshed in the background
    #[serde(default)]
    pub countries: Vec<String>,
}

impl SchedulerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes.unwrap_or(15).max(1) * 60)
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub politeness: Option<PolitenessConfig>,
    pub cache: Option<CacheConfig>,
    pub rate_limit: Option<RateLimitConfig>,
    pub scheduler: Option<SchedulerConfig>,
    /// Replaces the built-in feed catalog when non-empty
    #[serde(default)]
    pub feeds: Vec<FeedSource>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn politeness(&self) -> PolitenessConfig {
        self.politeness.clone().unwrap_or_default()
    }

    pub fn cache(&self) -> CacheConfig {
        self.cache.clone().unwrap_or_default()
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        self.scheduler.clone().unwrap_or_default()
    }

    /// Reject feed entries whose URL is not an absolute http(s) URL.
    fn validate(&self) -> Result<()> {
        for feed in &self.feeds {
            let parsed = url::Url::parse(&feed.url)
                .with_context(|| format!("Invalid feed URL for '{}': {}", feed.display_name, feed.url))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                anyhow::bail!("Feed '{}' must use http or https: {}", feed.display_name, feed.url);
            }
        }
        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
