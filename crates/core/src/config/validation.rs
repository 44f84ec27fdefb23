//! Configuration validation rules.
//!
//! Applied after `CacheConfig` values have been loaded from environment,
//! file, or defaults.

use crate::config::CacheConfig;
use crate::error::Error;

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if:
    /// - `capacity` is 0
    /// - `ttl_ms` is set to 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), Error> {
        if self.capacity == 0 {
            return Err(Error::Config("capacity must be greater than 0".into()));
        }

        if self.ttl_ms == Some(0) {
            return Err(Error::Config("ttl_ms must be greater than 0 when set".into()));
        }

        if self.timeout_ms < 100 {
            return Err(Error::Config("timeout_ms must be at least 100ms".into()));
        }
        if self.timeout_ms > 300_000 {
            return Err(Error::Config("timeout_ms must not exceed 5 minutes (300000ms)".into()));
        }

        if self.user_agent.is_empty() {
            return Err(Error::Config("user_agent must not be empty".into()));
        }

        Ok(())
    }
}
