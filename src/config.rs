//! Centralized runtime constants and environment overrides for tariffguard.
//!
//! All tunable intervals, endpoints, and seed data are collected here so they
//! can be found and adjusted in a single place rather than scattered across modules.

use std::time::Duration;

use anyhow::{Context, Result};

/// Interval at which the packet feed polls `GET /api/packets` (milliseconds).
pub const PACKET_POLL_INTERVAL_MS: u64 = 5000;

/// Base URL of the rule/packet API when no override is given.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";

/// Country catalog queried once at startup.
pub const DEFAULT_COUNTRIES_URL: &str = "https://restcountries.com/v3.1/all";

/// Rules the shadow store holds before any fallback write: (country, delay %, drop).
pub const SEED_FALLBACK_RULES: &[(&str, u32, bool)] = &[("US", 30, false), ("CN", 0, true)];

/// Upper bound of a delay percentage.
pub const MAX_DELAY_PERCENTAGE: u32 = 100;

pub const ENV_API_URL: &str = "TARIFFGUARD_API_URL";
pub const ENV_COUNTRIES_URL: &str = "TARIFFGUARD_COUNTRIES_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "TARIFFGUARD_POLL_INTERVAL_MS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TARIFFGUARD_REQUEST_TIMEOUT_SECS";

/// Resolved dashboard configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub api_base: String,
    pub countries_url: String,
    pub poll_interval: Duration,
    /// `None` means remote calls never time out.
    pub request_timeout: Option<Duration>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            countries_url: DEFAULT_COUNTRIES_URL.to_string(),
            poll_interval: Duration::from_millis(PACKET_POLL_INTERVAL_MS),
            request_timeout: None,
        }
    }
}

impl DashboardConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, falling back to defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            config.api_base = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup(ENV_COUNTRIES_URL) {
            config.countries_url = url;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            let ms: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_POLL_INTERVAL_MS} must be an integer, got {raw:?}"))?;
            anyhow::ensure!(ms > 0, "{ENV_POLL_INTERVAL_MS} must be positive");
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().with_context(|| {
                format!("{ENV_REQUEST_TIMEOUT_SECS} must be an integer, got {raw:?}")
            })?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}
