//! Lead extraction scheduling configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::extraction::ExtractionTrigger;

/// Thresholds and budgets for deferred lead extraction.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Quiet period after which a conversation is extracted
    #[serde(default = "default_inactivity")]
    pub inactivity_minutes: i64,

    /// Age after which a conversation is extracted even if still active
    #[serde(default = "default_max_age")]
    pub max_conversation_minutes: i64,

    /// Conversations evaluated per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Wall-clock budget for one batch, in seconds
    #[serde(default = "default_time_budget")]
    pub time_budget_secs: u64,

    /// Run the in-process scheduler loop
    #[serde(default = "default_scheduler_enabled")]
    pub scheduler_enabled: bool,

    /// Seconds between scheduler passes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl ExtractionConfig {
    pub fn trigger(&self) -> ExtractionTrigger {
        ExtractionTrigger::new(
            chrono::Duration::minutes(self.inactivity_minutes),
            chrono::Duration::minutes(self.max_conversation_minutes),
        )
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Validate extraction configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.inactivity_minutes <= 0 || self.max_conversation_minutes < self.inactivity_minutes {
            return Err(ValidationError::InvalidExtractionThresholds);
        }
        if self.batch_size == 0 || self.batch_size > 500 {
            return Err(ValidationError::InvalidBatchSize);
        }
        if self.time_budget_secs == 0 {
            return Err(ValidationError::InvalidTimeBudget);
        }
        Ok(())
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            inactivity_minutes: default_inactivity(),
            max_conversation_minutes: default_max_age(),
            batch_size: default_batch_size(),
            time_budget_secs: default_time_budget(),
            scheduler_enabled: default_scheduler_enabled(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_inactivity() -> i64 {
    10
}

fn default_max_age() -> i64 {
    30
}

fn default_batch_size() -> usize {
    10
}

fn default_time_budget() -> u64 {
    8
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.trigger(), ExtractionTrigger::default());
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.time_budget(), Duration::from_secs(8));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inactivity_cannot_exceed_max_age() {
        let config = ExtractionConfig {
            inactivity_minutes: 40,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidExtractionThresholds)
        );
    }

    #[test]
    fn test_batch_size_bounds() {
        let config = ExtractionConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBatchSize));
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = ExtractionConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }
}
