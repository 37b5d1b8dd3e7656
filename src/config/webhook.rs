//! Inbound message webhook configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Settings for the transport provider's message webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret for the `X-Signature` HMAC; unsigned requests are accepted when unset
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// Upper bound on reply generation, in seconds
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,

    /// Reply sent whenever the normal reply cannot be produced
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

impl WebhookConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    /// Returns the signing secret if one is configured.
    pub fn signing_secret(&self) -> Option<&str> {
        self.signing_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
    }

    /// Validate webhook configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.reply_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.fallback_reply.trim().is_empty() {
            return Err(ValidationError::EmptyFallbackReply);
        }
        if production && self.signing_secret().is_none() {
            return Err(ValidationError::MissingRequired("WEBHOOK__SIGNING_SECRET"));
        }
        Ok(())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            reply_timeout_secs: default_reply_timeout(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

fn default_reply_timeout() -> u64 {
    10
}

fn default_fallback_reply() -> String {
    "Thanks for your message! We'll get back to you shortly.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_defaults() {
        let config = WebhookConfig::default();
        assert_eq!(config.reply_timeout(), Duration::from_secs(10));
        assert!(config.signing_secret().is_none());
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn test_blank_secret_is_unset() {
        let config = WebhookConfig {
            signing_secret: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(config.signing_secret().is_none());
    }

    #[test]
    fn test_production_requires_secret() {
        assert_eq!(
            WebhookConfig::default().validate(true),
            Err(ValidationError::MissingRequired("WEBHOOK__SIGNING_SECRET"))
        );
    }

    #[test]
    fn test_empty_fallback_rejected() {
        let config = WebhookConfig {
            fallback_reply: String::new(),
            ..Default::default()
        };
        assert_eq!(config.validate(false), Err(ValidationError::EmptyFallbackReply));
    }
}
