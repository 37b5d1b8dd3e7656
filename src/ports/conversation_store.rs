//! Conversation state store port.
//!
//! Persistence for tenants (read only), conversations, messages and leads.
//!
//! # Design
//!
//! - **Atomic first contact**: a conversation and its lead are created in one
//!   operation that also re-checks for an open conversation under mutual
//!   exclusion, so concurrent first messages cannot produce duplicates.
//! - **Non-destructive lead merge**: `update_lead` applies a [`LeadPatch`]
//!   through [`Lead::apply`], never overwriting data with blanks.
//! - **Messages are append-only**; ordering is by timestamp, then insertion.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{Conversation, ConversationStatus, Message, Sender};
use crate::domain::foundation::{
    ConversationId, CustomerId, DomainError, LeadId, TenantId, Timestamp,
};
use crate::domain::lead::{Lead, LeadPatch};

/// Store port for conversation, message and lead state.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Resolves the tenant owning an inbound target identifier.
    ///
    /// Returns `None` for unknown or deactivated targets.
    async fn resolve_tenant(&self, target: &str) -> Result<Option<Tenant>, DomainError>;

    /// Finds the conversation for (tenant, customer) whose status is active or completed.
    async fn find_open_conversation(
        &self,
        tenant_id: TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Conversation>, DomainError>;

    /// Atomically creates a conversation together with its seeded lead.
    ///
    /// If another caller created an open conversation for the same
    /// (tenant, customer) first, that conversation is returned instead and
    /// nothing is written (`created == false`).
    async fn create_conversation_with_lead(
        &self,
        tenant_id: TenantId,
        customer_id: &CustomerId,
        seed_details: &str,
        now: Timestamp,
    ) -> Result<ConversationWithLead, DomainError>;

    /// Overwrites the status of a conversation and bumps `updated_at`.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound` if the conversation doesn't exist
    async fn set_conversation_status(
        &self,
        conversation_id: ConversationId,
        status: ConversationStatus,
        now: Timestamp,
    ) -> Result<(), DomainError>;

    /// Marks an active conversation completed after extraction.
    ///
    /// `extracted_through` is the highest message sequence the extraction
    /// saw. The write only happens while the conversation is still active and
    /// has no message beyond that sequence; otherwise nothing changes and
    /// `false` is returned.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound` if the conversation doesn't exist
    async fn complete_if_caught_up(
        &self,
        conversation_id: ConversationId,
        extracted_through: i64,
        now: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Appends a message and bumps the conversation's `updated_at`.
    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender: Sender,
        content: &str,
        now: Timestamp,
    ) -> Result<Message, DomainError>;

    /// Loads every message of the conversation in chronological order.
    async fn load_transcript(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, DomainError>;

    /// Returns message timestamps in chronological order.
    async fn message_timestamps(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Timestamp>, DomainError>;

    async fn find_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Conversation>, DomainError>;

    async fn find_lead_by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Lead>, DomainError>;

    /// Merges a patch into the conversation's lead.
    ///
    /// Returns true if a write happened. Empty patches never write.
    ///
    /// # Errors
    ///
    /// - `LeadNotFound` if the conversation has no lead
    async fn update_lead(
        &self,
        conversation_id: ConversationId,
        patch: &LeadPatch,
    ) -> Result<bool, DomainError>;

    /// Lists up to `limit` active conversations for a batch pass.
    ///
    /// Never-evaluated conversations come first, then the least recently
    /// evaluated, then the least recently updated.
    async fn list_active_conversations(&self, limit: usize)
        -> Result<Vec<Conversation>, DomainError>;

    /// Stamps conversations as evaluated by a batch pass at `now`.
    ///
    /// Does not touch `updated_at`. Unknown ids are ignored.
    async fn record_evaluations(
        &self,
        conversation_ids: &[ConversationId],
        now: Timestamp,
    ) -> Result<(), DomainError>;

    async fn count_active_conversations(&self) -> Result<u64, DomainError>;
}

/// Tenant as seen by the ingestion path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Inbound identifier (for example the business phone number).
    pub target: String,
}

/// Result of [`ConversationStore::create_conversation_with_lead`].
#[derive(Debug, Clone)]
pub struct ConversationWithLead {
    pub conversation: Conversation,
    pub lead_id: LeadId,
    /// False when a concurrent caller won the race and its rows were returned.
    pub created: bool,
}
