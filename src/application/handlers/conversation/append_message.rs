//! MessageLedger - append-only message log per conversation.

use std::sync::Arc;

use crate::domain::conversation::{Message, Sender};
use crate::domain::foundation::{ConversationId, DomainError, Timestamp, ValidationError};
use crate::ports::ConversationStore;

/// Appends and reads conversation messages.
#[derive(Clone)]
pub struct MessageLedger {
    store: Arc<dyn ConversationStore>,
}

impl MessageLedger {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Appends a message stamped with the current time.
    pub async fn append(
        &self,
        conversation_id: ConversationId,
        sender: Sender,
        content: &str,
    ) -> Result<Message, DomainError> {
        self.append_at(conversation_id, sender, content, Timestamp::now())
            .await
    }

    /// Appends a message with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the content is blank
    /// - `ConversationNotFound` if the conversation doesn't exist
    pub async fn append_at(
        &self,
        conversation_id: ConversationId,
        sender: Sender,
        content: &str,
        now: Timestamp,
    ) -> Result<Message, DomainError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::empty_field("content").into());
        }

        let message = self
            .store
            .append_message(conversation_id, sender, content, now)
            .await?;

        tracing::debug!(
            conversation_id = %conversation_id,
            sender = %sender,
            sequence = message.sequence,
            "Message appended"
        );
        Ok(message)
    }

    /// Chronological transcript of a conversation.
    pub async fn transcript(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, DomainError> {
        self.store.load_transcript(conversation_id).await
    }
}
