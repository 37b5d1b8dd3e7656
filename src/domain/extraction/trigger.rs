//! ExtractionTrigger - decides when a conversation is ready for lead extraction.
//!
//! Extraction is expensive (one language-model call over the full transcript),
//! so it is deferred until the conversation shows a natural pause or has been
//! open long enough that waiting any longer is pointless.
//!
//! Rules, evaluated in order:
//! 1. Already completed → never extract (idempotence guard).
//! 2. No message for `inactivity_threshold` → extract (`Inactivity`).
//! 3. First message older than `max_conversation_age` → extract (`Timeout`).
//! 4. Otherwise wait (`None`).
//!
//! The decision is a pure function of its inputs.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

/// Why extraction was (or was not) triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Inactivity,
    Timeout,
    None,
}

/// Outcome of [`ExtractionTrigger::decide`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDecision {
    pub should_extract: bool,
    pub reason: String,
    pub kind: TriggerKind,
}

/// Thresholds for the extraction decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionTrigger {
    inactivity_threshold: Duration,
    max_conversation_age: Duration,
}

impl Default for ExtractionTrigger {
    fn default() -> Self {
        Self {
            inactivity_threshold: Duration::minutes(10),
            max_conversation_age: Duration::minutes(30),
        }
    }
}

impl ExtractionTrigger {
    /// Creates a trigger with custom thresholds.
    pub fn new(inactivity_threshold: Duration, max_conversation_age: Duration) -> Self {
        Self {
            inactivity_threshold,
            max_conversation_age,
        }
    }

    pub fn inactivity_threshold(&self) -> Duration {
        self.inactivity_threshold
    }

    pub fn max_conversation_age(&self) -> Duration {
        self.max_conversation_age
    }

    /// Decides whether to extract now.
    pub fn decide(
        &self,
        last_message_at: Timestamp,
        first_message_at: Timestamp,
        already_completed: bool,
        now: Timestamp,
    ) -> TriggerDecision {
        if already_completed {
            return TriggerDecision {
                should_extract: false,
                reason: "already completed".to_string(),
                kind: TriggerKind::None,
            };
        }

        // Clock skew can put messages in the future; treat that as "just now".
        let idle = non_negative(now.duration_since(&last_message_at));
        let age = non_negative(now.duration_since(&first_message_at));

        if idle >= self.inactivity_threshold {
            return TriggerDecision {
                should_extract: true,
                reason: format!(
                    "no messages for {} (threshold {})",
                    format_elapsed(idle),
                    format_elapsed(self.inactivity_threshold)
                ),
                kind: TriggerKind::Inactivity,
            };
        }

        if age >= self.max_conversation_age {
            return TriggerDecision {
                should_extract: true,
                reason: format!(
                    "conversation open for {} (threshold {})",
                    format_elapsed(age),
                    format_elapsed(self.max_conversation_age)
                ),
                kind: TriggerKind::Timeout,
            };
        }

        TriggerDecision {
            should_extract: false,
            reason: format!(
                "waiting: last message {} ago, first message {} ago",
                format_elapsed(idle),
                format_elapsed(age)
            ),
            kind: TriggerKind::None,
        }
    }
}

fn non_negative(d: Duration) -> Duration {
    if d < Duration::zero() {
        Duration::zero()
    } else {
        d
    }
}

fn format_elapsed(d: Duration) -> String {
    let secs = d.num_seconds();
    format!("{}m {}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000)
    }

    #[test]
    fn inactivity_after_ten_quiet_minutes() {
        let now = now();
        let decision =
            ExtractionTrigger::default().decide(now.minus_minutes(12), now.minus_minutes(20), false, now);
        assert!(decision.should_extract);
        assert_eq!(decision.kind, TriggerKind::Inactivity);
    }

    #[test]
    fn timeout_for_long_running_conversation() {
        let now = now();
        let decision =
            ExtractionTrigger::default().decide(now.minus_minutes(5), now.minus_minutes(31), false, now);
        assert!(decision.should_extract);
        assert_eq!(decision.kind, TriggerKind::Timeout);
    }

    #[test]
    fn waits_while_conversation_is_lively() {
        let now = now();
        let decision =
            ExtractionTrigger::default().decide(now.minus_minutes(3), now.minus_minutes(10), false, now);
        assert!(!decision.should_extract);
        assert_eq!(decision.kind, TriggerKind::None);
        assert!(decision.reason.contains("3m 0s"));
        assert!(decision.reason.contains("10m 0s"));
    }

    #[test]
    fn completed_conversations_never_extract() {
        let now = now();
        let decision =
            ExtractionTrigger::default().decide(now.minus_minutes(60), now.minus_minutes(90), true, now);
        assert!(!decision.should_extract);
        assert_eq!(decision.reason, "already completed");
    }

    #[test]
    fn thresholds_are_inclusive() {
        let now = now();
        let decision =
            ExtractionTrigger::default().decide(now.minus_minutes(10), now.minus_minutes(10), false, now);
        assert_eq!(decision.kind, TriggerKind::Inactivity);
    }

    #[test]
    fn future_timestamps_are_treated_as_now() {
        let now = now();
        let decision = ExtractionTrigger::default().decide(
            now.plus_secs(120),
            now.plus_secs(60),
            false,
            now,
        );
        assert!(!decision.should_extract);
    }

    proptest! {
        #[test]
        fn decide_is_deterministic(
            idle_secs in 0u64..7_200,
            extra_age_secs in 0u64..7_200,
            completed in any::<bool>(),
        ) {
            let now = now();
            let last = Timestamp::from_unix_secs(now.as_unix_secs() - idle_secs);
            let first = Timestamp::from_unix_secs(now.as_unix_secs() - idle_secs - extra_age_secs);
            let trigger = ExtractionTrigger::default();

            let a = trigger.decide(last, first, completed, now);
            let b = trigger.decide(last, first, completed, now);
            prop_assert_eq!(&a, &b);
            if completed {
                prop_assert!(!a.should_extract);
            }
            prop_assert_eq!(a.should_extract, a.kind != TriggerKind::None);
        }
    }
}
