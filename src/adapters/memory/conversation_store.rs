//! In-memory ConversationStore for tests and single-instance development.
//!
//! All tables sit behind one mutex, so every operation (including
//! find-or-create) is trivially atomic within the process.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::conversation::{
    sort_chronologically, Conversation, ConversationStatus, Message, Sender,
};
use crate::domain::foundation::{
    ConversationId, CustomerId, DomainError, ErrorCode, MessageId, TenantId, Timestamp,
};
use crate::domain::lead::{Lead, LeadPatch};
use crate::ports::{ConversationStore, ConversationWithLead, Tenant};

/// In-memory [`ConversationStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationStore {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    /// Keyed by target identifier.
    tenants: HashMap<String, Tenant>,
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    leads: HashMap<ConversationId, Lead>,
    /// Last batch evaluation per conversation.
    evaluated_at: HashMap<ConversationId, Timestamp>,
    next_sequence: i64,
}

impl State {
    fn open_conversation(&self, tenant_id: TenantId, customer_id: &CustomerId) -> Option<&Conversation> {
        self.conversations.values().find(|c| {
            c.tenant_id() == tenant_id && c.customer_id() == customer_id && c.status().is_open()
        })
    }

    fn conversation_mut(&mut self, id: ConversationId) -> Result<&mut Conversation, DomainError> {
        self.conversations
            .get_mut(&id)
            .ok_or_else(|| conversation_not_found(id))
    }
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tenant reachable at `target`.
    pub async fn add_tenant(&self, name: &str, target: &str) -> Tenant {
        let tenant = Tenant {
            id: TenantId::new(),
            name: name.to_string(),
            target: target.to_string(),
        };
        self.state
            .lock()
            .await
            .tenants
            .insert(target.to_string(), tenant.clone());
        tenant
    }

    pub async fn conversation_count(&self) -> usize {
        self.state.lock().await.conversations.len()
    }

    pub async fn lead_count(&self) -> usize {
        self.state.lock().await.leads.len()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn resolve_tenant(&self, target: &str) -> Result<Option<Tenant>, DomainError> {
        Ok(self.state.lock().await.tenants.get(target.trim()).cloned())
    }

    async fn find_open_conversation(
        &self,
        tenant_id: TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Conversation>, DomainError> {
        let state = self.state.lock().await;
        Ok(state.open_conversation(tenant_id, customer_id).cloned())
    }

    async fn create_conversation_with_lead(
        &self,
        tenant_id: TenantId,
        customer_id: &CustomerId,
        seed_details: &str,
        now: Timestamp,
    ) -> Result<ConversationWithLead, DomainError> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.open_conversation(tenant_id, customer_id).cloned() {
            let lead_id = state
                .leads
                .get(&existing.id())
                .map(|lead| lead.id)
                .ok_or_else(|| lead_not_found(existing.id()))?;
            return Ok(ConversationWithLead {
                conversation: existing,
                lead_id,
                created: false,
            });
        }

        let conversation = Conversation::start(tenant_id, customer_id.clone(), now);
        let lead = Lead::seed(tenant_id, conversation.id(), customer_id, seed_details, now);
        let lead_id = lead.id;

        state.conversations.insert(conversation.id(), conversation.clone());
        state.leads.insert(conversation.id(), lead);

        Ok(ConversationWithLead {
            conversation,
            lead_id,
            created: true,
        })
    }

    async fn set_conversation_status(
        &self,
        conversation_id: ConversationId,
        status: ConversationStatus,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        let current = state.conversation_mut(conversation_id)?;
        *current = Conversation::reconstitute(
            current.id(),
            current.tenant_id(),
            current.customer_id().clone(),
            status,
            current.created_at(),
            now.max(current.updated_at()),
        );
        Ok(())
    }

    async fn complete_if_caught_up(
        &self,
        conversation_id: ConversationId,
        extracted_through: i64,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.lock().await;
        let newer_message = state
            .messages
            .get(&conversation_id)
            .map_or(false, |messages| {
                messages.iter().any(|m| m.sequence > extracted_through)
            });

        let current = state.conversation_mut(conversation_id)?;
        if current.status() != ConversationStatus::Active || newer_message {
            return Ok(false);
        }
        *current = Conversation::reconstitute(
            current.id(),
            current.tenant_id(),
            current.customer_id().clone(),
            ConversationStatus::Completed,
            current.created_at(),
            now.max(current.updated_at()),
        );
        Ok(true)
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender: Sender,
        content: &str,
        now: Timestamp,
    ) -> Result<Message, DomainError> {
        let mut state = self.state.lock().await;
        state.conversation_mut(conversation_id)?.touch(now);

        state.next_sequence += 1;
        let message = Message {
            id: MessageId::new(),
            conversation_id,
            sender,
            content: content.to_string(),
            created_at: now,
            sequence: state.next_sequence,
        };
        state
            .messages
            .entry(conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn load_transcript(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, DomainError> {
        let state = self.state.lock().await;
        if !state.conversations.contains_key(&conversation_id) {
            return Err(conversation_not_found(conversation_id));
        }
        let mut messages = state
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();
        sort_chronologically(&mut messages);
        Ok(messages)
    }

    async fn message_timestamps(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Timestamp>, DomainError> {
        Ok(self
            .load_transcript(conversation_id)
            .await?
            .into_iter()
            .map(|m| m.created_at)
            .collect())
    }

    async fn find_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Conversation>, DomainError> {
        Ok(self
            .state
            .lock()
            .await
            .conversations
            .get(&conversation_id)
            .cloned())
    }

    async fn find_lead_by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Lead>, DomainError> {
        Ok(self.state.lock().await.leads.get(&conversation_id).cloned())
    }

    async fn update_lead(
        &self,
        conversation_id: ConversationId,
        patch: &LeadPatch,
    ) -> Result<bool, DomainError> {
        if patch.is_empty() {
            return Ok(false);
        }
        let mut state = self.state.lock().await;
        let lead = state
            .leads
            .get_mut(&conversation_id)
            .ok_or_else(|| lead_not_found(conversation_id))?;
        Ok(lead.apply(patch))
    }

    async fn list_active_conversations(
        &self,
        limit: usize,
    ) -> Result<Vec<Conversation>, DomainError> {
        let state = self.state.lock().await;
        let mut active: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.status() == ConversationStatus::Active)
            .cloned()
            .collect();
        active.sort_by_key(|c| {
            (
                state.evaluated_at.get(&c.id()).copied(),
                c.updated_at(),
                *c.id().as_uuid(),
            )
        });
        active.truncate(limit);
        Ok(active)
    }

    async fn record_evaluations(
        &self,
        conversation_ids: &[ConversationId],
        now: Timestamp,
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        for id in conversation_ids {
            if state.conversations.contains_key(id) {
                state.evaluated_at.insert(*id, now);
            }
        }
        Ok(())
    }

    async fn count_active_conversations(&self) -> Result<u64, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .conversations
            .values()
            .filter(|c| c.status() == ConversationStatus::Active)
            .count() as u64)
    }
}

fn conversation_not_found(id: ConversationId) -> DomainError {
    DomainError::new(ErrorCode::ConversationNotFound, "Conversation not found")
        .with_detail("conversation_id", id.to_string())
}

fn lead_not_found(id: ConversationId) -> DomainError {
    DomainError::new(ErrorCode::LeadNotFound, "No lead for conversation")
        .with_detail("conversation_id", id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lead::{LeadStatus, LeadType, PLACEHOLDER_NAME};
    use futures::future::join_all;

    fn customer() -> CustomerId {
        CustomerId::new("+201234567890").unwrap()
    }

    #[tokio::test]
    async fn resolves_registered_tenants_only() {
        let store = InMemoryConversationStore::new();
        let tenant = store.add_tenant("Cafe", "+15550001").await;
        assert_eq!(store.resolve_tenant("+15550001").await.unwrap(), Some(tenant));
        assert_eq!(store.resolve_tenant("+15550002").await.unwrap(), None);
    }

    #[tokio::test]
    async fn creates_conversation_and_seeded_lead_together() {
        let store = InMemoryConversationStore::new();
        let tenant = TenantId::new();
        let created = store
            .create_conversation_with_lead(tenant, &customer(), "Table for two?", Timestamp::now())
            .await
            .unwrap();
        assert!(created.created);

        let lead = store
            .find_lead_by_conversation(created.conversation.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lead.id, created.lead_id);
        assert_eq!(lead.customer_name, PLACEHOLDER_NAME);
        assert_eq!(lead.lead_type, LeadType::Inquiry);
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.details, "Table for two?");
    }

    #[tokio::test]
    async fn concurrent_creates_yield_one_pair() {
        let store = InMemoryConversationStore::new();
        let tenant = TenantId::new();
        let calls = (0..20).map(|_| {
            let store = store.clone();
            async move {
                store
                    .create_conversation_with_lead(tenant, &customer(), "hi", Timestamp::now())
                    .await
                    .unwrap()
            }
        });
        let results = join_all(calls).await;

        assert_eq!(results.iter().filter(|r| r.created).count(), 1);
        assert_eq!(store.conversation_count().await, 1);
        assert_eq!(store.lead_count().await, 1);
    }

    #[tokio::test]
    async fn archived_conversations_are_not_open() {
        let store = InMemoryConversationStore::new();
        let tenant = TenantId::new();
        let first = store
            .create_conversation_with_lead(tenant, &customer(), "hi", Timestamp::now())
            .await
            .unwrap();
        store
            .set_conversation_status(first.conversation.id(), ConversationStatus::Archived, Timestamp::now())
            .await
            .unwrap();

        assert!(store
            .find_open_conversation(tenant, &customer())
            .await
            .unwrap()
            .is_none());
        let second = store
            .create_conversation_with_lead(tenant, &customer(), "back again", Timestamp::now())
            .await
            .unwrap();
        assert!(second.created);
        assert_ne!(second.conversation.id(), first.conversation.id());
    }

    #[tokio::test]
    async fn transcript_is_chronological_with_insertion_tiebreak() {
        let store = InMemoryConversationStore::new();
        let created = store
            .create_conversation_with_lead(TenantId::new(), &customer(), "hi", Timestamp::now())
            .await
            .unwrap();
        let id = created.conversation.id();
        let t = Timestamp::from_unix_secs(1_700_000_000);

        store.append_message(id, Sender::Customer, "second", t.plus_secs(5)).await.unwrap();
        store.append_message(id, Sender::Customer, "first", t).await.unwrap();
        store.append_message(id, Sender::Bot, "third", t.plus_secs(5)).await.unwrap();

        let contents: Vec<String> = store
            .load_transcript(id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(store.message_timestamps(id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_patch_is_not_written() {
        let store = InMemoryConversationStore::new();
        let created = store
            .create_conversation_with_lead(TenantId::new(), &customer(), "hi", Timestamp::now())
            .await
            .unwrap();
        assert!(!store
            .update_lead(created.conversation.id(), &LeadPatch::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn update_lead_without_lead_fails() {
        let store = InMemoryConversationStore::new();
        let patch = LeadPatch {
            customer_name: Some("Sara".into()),
            ..Default::default()
        };
        let err = store.update_lead(ConversationId::new(), &patch).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::LeadNotFound);
    }

    #[tokio::test]
    async fn completion_waits_for_unseen_messages() {
        let store = InMemoryConversationStore::new();
        let created = store
            .create_conversation_with_lead(TenantId::new(), &customer(), "hi", Timestamp::now())
            .await
            .unwrap();
        let id = created.conversation.id();
        let seen = store
            .append_message(id, Sender::Customer, "hi", Timestamp::now())
            .await
            .unwrap();
        store
            .append_message(id, Sender::Customer, "one more thing", Timestamp::now())
            .await
            .unwrap();

        assert!(!store
            .complete_if_caught_up(id, seen.sequence, Timestamp::now())
            .await
            .unwrap());
        let conversation = store.find_conversation(id).await.unwrap().unwrap();
        assert_eq!(conversation.status(), ConversationStatus::Active);

        let last = store.load_transcript(id).await.unwrap().last().unwrap().sequence;
        assert!(store
            .complete_if_caught_up(id, last, Timestamp::now())
            .await
            .unwrap());
        let conversation = store.find_conversation(id).await.unwrap().unwrap();
        assert_eq!(conversation.status(), ConversationStatus::Completed);
    }

    #[tokio::test]
    async fn completion_only_moves_active_conversations() {
        let store = InMemoryConversationStore::new();
        let created = store
            .create_conversation_with_lead(TenantId::new(), &customer(), "hi", Timestamp::now())
            .await
            .unwrap();
        let id = created.conversation.id();
        store
            .set_conversation_status(id, ConversationStatus::Archived, Timestamp::now())
            .await
            .unwrap();

        assert!(!store.complete_if_caught_up(id, 0, Timestamp::now()).await.unwrap());
        let err = store
            .complete_if_caught_up(ConversationId::new(), 0, Timestamp::now())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConversationNotFound);
    }

    #[tokio::test]
    async fn evaluated_conversations_move_to_the_back() {
        let store = InMemoryConversationStore::new();
        let tenant = TenantId::new();
        let older = store
            .create_conversation_with_lead(
                tenant,
                &CustomerId::new("a").unwrap(),
                "hi",
                Timestamp::from_unix_secs(100),
            )
            .await
            .unwrap();
        let newer = store
            .create_conversation_with_lead(
                tenant,
                &CustomerId::new("b").unwrap(),
                "hi",
                Timestamp::from_unix_secs(200),
            )
            .await
            .unwrap();

        store
            .record_evaluations(&[older.conversation.id(), ConversationId::new()], Timestamp::now())
            .await
            .unwrap();

        let head = store.list_active_conversations(1).await.unwrap();
        assert_eq!(head[0].id(), newer.conversation.id());

        let unchanged = store
            .find_conversation(older.conversation.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.updated_at(), Timestamp::from_unix_secs(100));
    }

    #[tokio::test]
    async fn lists_active_least_recently_updated_first() {
        let store = InMemoryConversationStore::new();
        let tenant = TenantId::new();
        let older = store
            .create_conversation_with_lead(
                tenant,
                &CustomerId::new("a").unwrap(),
                "hi",
                Timestamp::from_unix_secs(100),
            )
            .await
            .unwrap();
        let newer = store
            .create_conversation_with_lead(
                tenant,
                &CustomerId::new("b").unwrap(),
                "hi",
                Timestamp::from_unix_secs(200),
            )
            .await
            .unwrap();
        store
            .set_conversation_status(newer.conversation.id(), ConversationStatus::Completed, Timestamp::from_unix_secs(300))
            .await
            .unwrap();

        let active = store.list_active_conversations(10).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id(), older.conversation.id());
        assert_eq!(store.count_active_conversations().await.unwrap(), 1);
    }
}
