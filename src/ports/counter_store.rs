//! Counter store port - atomic windowed counters backing rate limiting.
//!
//! Keys are opaque strings. Every counter carries its own expiry so that
//! per-window buckets disappear on their own once the window has passed.

use async_trait::async_trait;

/// Port for shared, expiring integer counters.
///
/// Implementations must make `increment_and_get` atomic with respect to
/// concurrent callers, including callers in other processes when the
/// backing store is shared.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increments the counter and returns the new value.
    ///
    /// When the counter is created by this call it expires after `ttl_secs`.
    async fn increment_and_get(&self, key: &str, ttl_secs: u64) -> Result<u64, CounterStoreError>;

    /// Returns the current value, or 0 if the counter does not exist.
    async fn get(&self, key: &str) -> Result<u64, CounterStoreError>;

    /// Decrements the counter, never below zero.
    ///
    /// Used to hand back a slot that was taken speculatively.
    async fn decrement(&self, key: &str) -> Result<(), CounterStoreError>;

    /// Deletes every counter whose key starts with `prefix`; returns how many went.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CounterStoreError>;

    /// Lists `(key, value)` for every live counter whose key starts with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>, CounterStoreError>;
}

/// Errors from counter store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CounterStoreError {
    /// Backend unreachable or returned an error.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    /// Stored value is not an integer counter.
    #[error("corrupt counter at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl CounterStoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_display() {
        assert_eq!(
            CounterStoreError::unavailable("connection refused").to_string(),
            "counter store unavailable: connection refused"
        );
        let corrupt = CounterStoreError::Corrupt {
            key: "ratelimit:x".into(),
            reason: "not an integer".into(),
        };
        assert_eq!(corrupt.to_string(), "corrupt counter at ratelimit:x: not an integer");
    }
}
