//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid host or port")]
    InvalidSocketAddr,

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Rate limit window must be positive")]
    InvalidRateLimitWindow,

    #[error("Rate limit ceilings must be positive")]
    InvalidRateLimitCeiling,

    #[error("AI base URL must be http(s)")]
    InvalidAiBaseUrl,

    #[error("Inactivity threshold must be positive and not exceed the maximum conversation age")]
    InvalidExtractionThresholds,

    #[error("Extraction batch size must be between 1 and 500")]
    InvalidBatchSize,

    #[error("Extraction time budget must be positive")]
    InvalidTimeBudget,

    #[error("Fallback reply must not be empty")]
    EmptyFallbackReply,
}
