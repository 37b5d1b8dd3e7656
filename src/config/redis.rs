//! Redis connection used by the shared rate-limit counters

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const SCHEMES: &[&str] = &["redis://", "rediss://", "redis+unix://"];

/// Only consulted when `rate_limit.backend = redis`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,

    /// Bound on the initial connection, in seconds
    pub timeout_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            timeout_secs: 5,
        }
    }
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS__URL"));
        }
        if !SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}
