//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `LEADFLOW` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use leadflow::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod database;
mod error;
mod extraction;
mod rate_limit;
mod redis;
mod server;
mod webhook;

pub use ai::AiConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use extraction::ExtractionConfig;
pub use rate_limit::{CounterBackend, RateLimitConfig};
pub use redis::RedisConfig;
pub use server::{Environment, LogFormat, ServerConfig};
pub use webhook::WebhookConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection; empty selects the in-memory store
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Redis connection for the distributed counter store
    #[serde(default)]
    pub redis: RedisConfig,

    /// Message quotas
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Language model provider
    #[serde(default)]
    pub ai: AiConfig,

    /// Deferred extraction thresholds and budgets
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Inbound webhook settings
    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `LEADFLOW` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `LEADFLOW__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `LEADFLOW__RATE_LIMIT__PER_SENDER_LIMIT=3` -> `rate_limit.per_sender_limit = 3`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("LEADFLOW")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Redis settings are only checked when the rate limiter uses them.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let production = self.is_production();
        self.server.validate()?;
        self.database.validate(production)?;
        if self.rate_limit.backend == CounterBackend::Redis {
            self.redis.validate()?;
        }
        self.rate_limit.validate()?;
        self.ai.validate()?;
        self.extraction.validate()?;
        self.webhook.validate(production)?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
