//! Messages exchanged within a conversation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{ConversationId, MessageId, Timestamp, ValidationError};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Customer,
    Bot,
}

impl Sender {
    /// Returns the storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::Customer => "customer",
            Sender::Bot => "bot",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Sender {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Sender::Customer),
            "bot" => Ok(Sender::Bot),
            other => Err(ValidationError::unknown_variant("sender", other)),
        }
    }
}

/// An immutable message in a conversation.
///
/// Messages are ordered by `created_at`, ties broken by `sequence`
/// (insertion order assigned by the store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: Sender,
    pub content: String,
    pub created_at: Timestamp,
    pub sequence: i64,
}

impl Message {
    /// Formats the message as one transcript line.
    pub fn transcript_line(&self) -> String {
        let who = match self.sender {
            Sender::Customer => "Customer",
            Sender::Bot => "Assistant",
        };
        format!("{}: {}", who, self.content)
    }
}

/// Renders an ordered list of messages as a plain-text transcript.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(Message::transcript_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sorts messages by timestamp, keeping insertion order for ties.
pub fn sort_chronologically(messages: &mut [Message]) {
    messages.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then(a.sequence.cmp(&b.sequence))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: Sender, content: &str, secs: u64, sequence: i64) -> Message {
        Message {
            id: MessageId::new(),
            conversation_id: ConversationId::new(),
            sender,
            content: content.to_string(),
            created_at: Timestamp::from_unix_secs(secs),
            sequence,
        }
    }

    #[test]
    fn transcript_labels_speakers() {
        let messages = vec![
            message(Sender::Customer, "Hi, I'm Sara", 10, 1),
            message(Sender::Bot, "Hello Sara!", 11, 2),
        ];
        assert_eq!(
            render_transcript(&messages),
            "Customer: Hi, I'm Sara\nAssistant: Hello Sara!"
        );
    }

    #[test]
    fn sort_breaks_ties_by_sequence() {
        let mut messages = vec![
            message(Sender::Bot, "second", 10, 2),
            message(Sender::Customer, "third", 11, 3),
            message(Sender::Customer, "first", 10, 1),
        ];
        sort_chronologically(&mut messages);
        let order: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn sender_parses_storage_representation() {
        assert_eq!("bot".parse::<Sender>().unwrap(), Sender::Bot);
        assert!("agent".parse::<Sender>().is_err());
    }
}
