//! ConversationGateway - lookup, creation and status transitions of conversations.

use serde::Serialize;
use std::sync::Arc;

use crate::domain::conversation::{Conversation, ConversationStatus};
use crate::domain::foundation::{CustomerId, DomainError, LeadId, TenantId, Timestamp};
use crate::ports::ConversationStore;

/// How [`ConversationGateway::find_or_create`] obtained the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationOrigin {
    /// An active conversation already existed.
    Existing,
    /// A completed conversation was flipped back to active.
    Reopened,
    /// First contact: conversation and lead were created together.
    Created,
}

/// Result of [`ConversationGateway::find_or_create`].
#[derive(Debug, Clone)]
pub struct ConversationHandle {
    pub conversation: Conversation,
    /// Known only when this call created the lead.
    pub lead_id: Option<LeadId>,
    pub origin: ConversationOrigin,
}

/// Orchestrates find-or-create and status changes on top of the store.
#[derive(Clone)]
pub struct ConversationGateway {
    store: Arc<dyn ConversationStore>,
}

impl ConversationGateway {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Returns the open conversation for (tenant, customer), creating it and
    /// its lead on first contact. Completed conversations are reopened.
    pub async fn find_or_create(
        &self,
        tenant_id: TenantId,
        customer_id: &CustomerId,
        first_message_body: &str,
    ) -> Result<ConversationHandle, DomainError> {
        let now = Timestamp::now();

        if let Some(conversation) = self
            .store
            .find_open_conversation(tenant_id, customer_id)
            .await?
        {
            return self.reopen_if_completed(conversation, None, now).await;
        }

        let created = self
            .store
            .create_conversation_with_lead(tenant_id, customer_id, first_message_body, now)
            .await?;

        if created.created {
            tracing::info!(
                tenant_id = %tenant_id,
                conversation_id = %created.conversation.id(),
                lead_id = %created.lead_id,
                "Conversation and lead created"
            );
            return Ok(ConversationHandle {
                conversation: created.conversation,
                lead_id: Some(created.lead_id),
                origin: ConversationOrigin::Created,
            });
        }

        // Lost the race to a concurrent first message.
        self.reopen_if_completed(created.conversation, Some(created.lead_id), now)
            .await
    }

    async fn reopen_if_completed(
        &self,
        mut conversation: Conversation,
        lead_id: Option<LeadId>,
        now: Timestamp,
    ) -> Result<ConversationHandle, DomainError> {
        if !conversation.is_completed() {
            return Ok(ConversationHandle {
                conversation,
                lead_id,
                origin: ConversationOrigin::Existing,
            });
        }

        conversation.transition_to(ConversationStatus::Active, now)?;
        self.store
            .set_conversation_status(conversation.id(), ConversationStatus::Active, now)
            .await?;

        tracing::info!(
            conversation_id = %conversation.id(),
            "Completed conversation reopened"
        );
        Ok(ConversationHandle {
            conversation,
            lead_id,
            origin: ConversationOrigin::Reopened,
        })
    }

    /// Marks a conversation completed after extraction covered every message
    /// up to sequence `extracted_through`.
    ///
    /// Returns false and leaves the conversation as it is when it is no longer
    /// active or a newer message arrived while extraction was running.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if `conversation` cannot become completed
    /// - `ConversationNotFound` if the store doesn't know the conversation
    pub async fn mark_completed(
        &self,
        conversation: &Conversation,
        extracted_through: i64,
    ) -> Result<bool, DomainError> {
        let now = Timestamp::now();
        conversation
            .clone()
            .transition_to(ConversationStatus::Completed, now)?;

        let completed = self
            .store
            .complete_if_caught_up(conversation.id(), extracted_through, now)
            .await?;

        if completed {
            tracing::debug!(conversation_id = %conversation.id(), "Conversation completed");
        } else {
            tracing::info!(
                conversation_id = %conversation.id(),
                extracted_through,
                "Conversation changed during extraction, left open"
            );
        }
        Ok(completed)
    }
}
