//! Conversation entity - one exchange between a tenant and one customer identifier.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    ConversationId, CustomerId, DomainError, ErrorCode, TenantId, Timestamp,
};

use super::ConversationStatus;

/// An ongoing exchange with one customer under one tenant.
///
/// At most one conversation per (tenant, customer) may be open
/// (active or completed) at a time; the store enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    tenant_id: TenantId,
    customer_id: CustomerId,
    status: ConversationStatus,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Conversation {
    /// Starts a new active conversation.
    pub fn start(tenant_id: TenantId, customer_id: CustomerId, now: Timestamp) -> Self {
        Self {
            id: ConversationId::new(),
            tenant_id,
            customer_id,
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a conversation from persisted state.
    pub fn reconstitute(
        id: ConversationId,
        tenant_id: TenantId,
        customer_id: CustomerId,
        status: ConversationStatus,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            tenant_id,
            customer_id,
            status,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    pub fn status(&self) -> ConversationStatus {
        self.status
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Returns true once extraction has run for this conversation.
    pub fn is_completed(&self) -> bool {
        self.status == ConversationStatus::Completed
    }

    /// Records activity at `now`; `updated_at` never moves backwards.
    pub fn touch(&mut self, now: Timestamp) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Moves the conversation to `target`, rejecting invalid transitions.
    ///
    /// Transitioning to the current status is a no-op.
    pub fn transition_to(
        &mut self,
        target: ConversationStatus,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        if self.status == target {
            return Ok(());
        }
        if !self.status.can_transition_to(&target) {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot move conversation from {} to {}", self.status, target),
            )
            .with_detail("conversation_id", self.id.to_string()));
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Conversation {
        Conversation::start(
            TenantId::new(),
            CustomerId::new("+201234567890").unwrap(),
            Timestamp::from_unix_secs(1_000),
        )
    }

    #[test]
    fn starts_active() {
        let c = conversation();
        assert_eq!(c.status(), ConversationStatus::Active);
        assert_eq!(c.created_at(), c.updated_at());
    }

    #[test]
    fn complete_then_reopen() {
        let mut c = conversation();
        c.transition_to(ConversationStatus::Completed, Timestamp::from_unix_secs(2_000))
            .unwrap();
        assert!(c.is_completed());
        c.transition_to(ConversationStatus::Active, Timestamp::from_unix_secs(3_000))
            .unwrap();
        assert_eq!(c.status(), ConversationStatus::Active);
        assert_eq!(c.updated_at(), Timestamp::from_unix_secs(3_000));
    }

    #[test]
    fn archived_cannot_reopen() {
        let mut c = conversation();
        c.transition_to(ConversationStatus::Archived, Timestamp::now())
            .unwrap();
        let err = c
            .transition_to(ConversationStatus::Active, Timestamp::now())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn touch_is_monotonic() {
        let mut c = conversation();
        c.touch(Timestamp::from_unix_secs(5_000));
        c.touch(Timestamp::from_unix_secs(4_000));
        assert_eq!(c.updated_at(), Timestamp::from_unix_secs(5_000));
    }

    #[test]
    fn same_status_is_noop() {
        let mut c = conversation();
        let before = c.updated_at();
        c.transition_to(ConversationStatus::Active, Timestamp::from_unix_secs(9_999))
            .unwrap();
        assert_eq!(c.updated_at(), before);
    }
}
