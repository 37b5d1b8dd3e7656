//! ConversationStatus enum for tracking the lifecycle of a customer conversation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Lifecycle status of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl ConversationStatus {
    /// Returns true if the conversation still counts toward the
    /// one-open-conversation-per-customer rule.
    pub fn is_open(&self) -> bool {
        matches!(self, ConversationStatus::Active | ConversationStatus::Completed)
    }

    /// Validates a transition from this status to another.
    ///
    /// Valid transitions:
    /// - Active -> Completed (extraction finished)
    /// - Completed -> Active (customer wrote again)
    /// - Active | Completed -> Archived (administrative)
    pub fn can_transition_to(&self, target: &ConversationStatus) -> bool {
        use ConversationStatus::*;
        matches!(
            (self, target),
            (Active, Completed) | (Completed, Active) | (Active, Archived) | (Completed, Archived)
        )
    }

    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ConversationStatus::Active),
            "completed" => Ok(ConversationStatus::Completed),
            "archived" => Ok(ConversationStatus::Archived),
            other => Err(ValidationError::unknown_variant("conversation_status", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_active() {
        assert_eq!(ConversationStatus::default(), ConversationStatus::Active);
    }

    #[test]
    fn open_statuses() {
        assert!(ConversationStatus::Active.is_open());
        assert!(ConversationStatus::Completed.is_open());
        assert!(!ConversationStatus::Archived.is_open());
    }

    #[test]
    fn completed_can_reopen() {
        assert!(ConversationStatus::Completed.can_transition_to(&ConversationStatus::Active));
        assert!(ConversationStatus::Active.can_transition_to(&ConversationStatus::Completed));
    }

    #[test]
    fn archived_is_terminal() {
        assert!(!ConversationStatus::Archived.can_transition_to(&ConversationStatus::Active));
        assert!(!ConversationStatus::Archived.can_transition_to(&ConversationStatus::Completed));
    }

    #[test]
    fn parses_storage_representation() {
        for status in [
            ConversationStatus::Active,
            ConversationStatus::Completed,
            ConversationStatus::Archived,
        ] {
            assert_eq!(status.as_str().parse::<ConversationStatus>().unwrap(), status);
        }
        assert!("closed".parse::<ConversationStatus>().is_err());
    }

    #[test]
    fn serializes_to_snake_case_json() {
        assert_eq!(
            serde_json::to_string(&ConversationStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
