//! ============================================================================
//! Access Configuration
//! ============================================================================
//! Tunables for the verdict cache and fact lookups. Defaults are compiled in;
//! `AccessConfig::from_env` overrides them from the environment:
//!   FEED_ACCESS_CACHE_TTL_SECS      verdict time-to-live (default 300)
//!   FEED_ACCESS_CACHE_MAX_ENTRIES   verdict cache size bound (default 1000)
//!   FEED_ACCESS_LOOKUP_TIMEOUT_MS   per-fact lookup timeout (default 2000)
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Default verdict cache duration in seconds (5 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Maximum number of cached verdicts to prevent unbounded growth
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;

/// Default timeout for a single entitlement lookup
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2000;

pub const ENV_CACHE_TTL_SECS: &str = "FEED_ACCESS_CACHE_TTL_SECS";
pub const ENV_CACHE_MAX_ENTRIES: &str = "FEED_ACCESS_CACHE_MAX_ENTRIES";
pub const ENV_LOOKUP_TIMEOUT_MS: &str = "FEED_ACCESS_LOOKUP_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub lookup_timeout_ms: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
        }
    }
}

impl AccessConfig {
    /// Load from the process environment, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (used by `from_env` and tests)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            cache_ttl_secs: parse_or(&lookup, ENV_CACHE_TTL_SECS, defaults.cache_ttl_secs),
            cache_max_entries: parse_or(&lookup, ENV_CACHE_MAX_ENTRIES, defaults.cache_max_entries)
                .max(1),
            lookup_timeout_ms: parse_or(&lookup, ENV_LOOKUP_TIMEOUT_MS, defaults.lookup_timeout_ms),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!("Invalid value '{}' for {} - using default", raw, key);
                default
            }
        },
        None => default,
    }
}
