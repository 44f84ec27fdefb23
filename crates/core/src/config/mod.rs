//! Cache configuration with layered loading.
//!
//! Loading precedence (highest wins):
//!
//! 1. Environment variables (`CACHETTE_*`)
//! 2. TOML config file (if `CACHETTE_CONFIG_FILE` set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

use crate::error::Error;

/// Configuration accepted at cache construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of stored entries before LRU eviction.
    ///
    /// Set via CACHETTE_CAPACITY environment variable.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Optional hard TTL in milliseconds. Entries older than this are
    /// dropped at lookup regardless of HTTP freshness.
    ///
    /// Set via CACHETTE_TTL_MS environment variable.
    #[serde(default)]
    pub ttl_ms: Option<u64>,

    /// User-Agent string for upstream fetches.
    ///
    /// Set via CACHETTE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream fetch timeout in milliseconds.
    ///
    /// Set via CACHETTE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum redirects an upstream fetch may follow.
    ///
    /// Set via CACHETTE_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_capacity() -> usize {
    100
}

fn default_user_agent() -> String {
    "cachette/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_ms: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl CacheConfig {
    /// Hard TTL as a `Duration`, when configured.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    /// Fetch timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a source cannot be read or the loaded
    /// values fail validation.
    pub fn load() -> Result<Self, Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CACHETTE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CACHETTE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| Error::Config(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
