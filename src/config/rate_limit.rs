//! Rate limit configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Which counter store backs the rate limiter.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CounterBackend {
    /// Process-local counters; single instance only.
    #[default]
    Memory,
    /// Shared Redis counters.
    Redis,
}

/// Per-sender and per-target message ceilings within one fixed window.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub backend: CounterBackend,

    /// Window length in seconds
    #[serde(default = "default_window")]
    pub window_secs: u64,

    /// Messages one sender may send to one target per window
    #[serde(default = "default_per_sender")]
    pub per_sender_limit: u64,

    /// Messages one target may receive from all senders per window
    #[serde(default = "default_global")]
    pub global_limit: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Validate rate limit configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.window_secs == 0 {
            return Err(ValidationError::InvalidRateLimitWindow);
        }
        if self.per_sender_limit == 0 || self.global_limit == 0 {
            return Err(ValidationError::InvalidRateLimitCeiling);
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backend: CounterBackend::default(),
            window_secs: default_window(),
            per_sender_limit: default_per_sender(),
            global_limit: default_global(),
        }
    }
}

fn default_window() -> u64 {
    3600
}

fn default_per_sender() -> u64 {
    5
}

fn default_global() -> u64 {
    30
}
