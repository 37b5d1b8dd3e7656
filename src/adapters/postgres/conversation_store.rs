//! PostgreSQL implementation of ConversationStore.
//!
//! First contact runs in one transaction that takes a transaction-scoped
//! advisory lock on the (tenant, customer) pair before re-checking for an
//! open conversation. The partial unique index on open conversations backs
//! this up at the schema level.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::conversation::{Conversation, ConversationStatus, Message, Sender};
use crate::domain::foundation::{
    ConversationId, CustomerId, DomainError, ErrorCode, LeadId, MessageId, TenantId, Timestamp,
};
use crate::domain::lead::{Lead, LeadPatch};
use crate::ports::{ConversationStore, ConversationWithLead, Tenant};

const CONVERSATION_COLUMNS: &str =
    "id, tenant_id, customer_identifier, status, created_at, updated_at";

const LEAD_COLUMNS: &str = "id, tenant_id, conversation_id, lead_type, customer_name, \
     customer_phone, details, status, created_at";

/// PostgreSQL implementation of ConversationStore.
#[derive(Clone)]
pub struct PostgresConversationStore {
    pool: PgPool,
}

impl PostgresConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn open_conversation_in(
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Conversation>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM conversations \
             WHERE tenant_id = $1 AND customer_identifier = $2 \
               AND status IN ('active', 'completed') \
             LIMIT 1",
            CONVERSATION_COLUMNS
        ))
        .bind(tenant_id.as_uuid())
        .bind(customer_id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| DomainError::database("Failed to fetch open conversation", e))?;

        row.map(row_to_conversation).transpose()
    }
}

#[async_trait]
impl ConversationStore for PostgresConversationStore {
    async fn resolve_tenant(&self, target: &str) -> Result<Option<Tenant>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, target_identifier
            FROM tenants
            WHERE target_identifier = $1 AND active
            "#,
        )
        .bind(target.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to resolve tenant", e))?;

        match row {
            Some(row) => Ok(Some(Tenant {
                id: TenantId::from_uuid(get(&row, "id")?),
                name: get(&row, "name")?,
                target: get(&row, "target_identifier")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_open_conversation(
        &self,
        tenant_id: TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Conversation>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM conversations \
             WHERE tenant_id = $1 AND customer_identifier = $2 \
               AND status IN ('active', 'completed') \
             LIMIT 1",
            CONVERSATION_COLUMNS
        ))
        .bind(tenant_id.as_uuid())
        .bind(customer_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch open conversation", e))?;

        row.map(row_to_conversation).transpose()
    }

    async fn create_conversation_with_lead(
        &self,
        tenant_id: TenantId,
        customer_id: &CustomerId,
        seed_details: &str,
        now: Timestamp,
    ) -> Result<ConversationWithLead, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("{}:{}", tenant_id, customer_id))
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database("Failed to acquire conversation lock", e))?;

        if let Some(existing) = Self::open_conversation_in(&mut tx, tenant_id, customer_id).await? {
            let lead_id: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM leads WHERE conversation_id = $1")
                    .bind(existing.id().as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| DomainError::database("Failed to fetch lead", e))?;
            tx.commit()
                .await
                .map_err(|e| DomainError::database("Failed to commit transaction", e))?;

            let lead_id = lead_id.ok_or_else(|| {
                DomainError::new(ErrorCode::LeadNotFound, "No lead for conversation")
                    .with_detail("conversation_id", existing.id().to_string())
            })?;
            return Ok(ConversationWithLead {
                conversation: existing,
                lead_id: LeadId::from_uuid(lead_id),
                created: false,
            });
        }

        let conversation = Conversation::start(tenant_id, customer_id.clone(), now);
        let lead = Lead::seed(tenant_id, conversation.id(), customer_id, seed_details, now);

        sqlx::query(
            r#"
            INSERT INTO conversations (
                id, tenant_id, customer_identifier, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(conversation.id().as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(customer_id.as_str())
        .bind(conversation.status().as_str())
        .bind(conversation.created_at().as_datetime())
        .bind(conversation.updated_at().as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to insert conversation", e))?;

        sqlx::query(
            r#"
            INSERT INTO leads (
                id, tenant_id, conversation_id, lead_type, customer_name,
                customer_phone, details, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(lead.id.as_uuid())
        .bind(lead.tenant_id.as_uuid())
        .bind(lead.conversation_id.as_uuid())
        .bind(lead.lead_type.as_str())
        .bind(&lead.customer_name)
        .bind(&lead.customer_phone)
        .bind(&lead.details)
        .bind(lead.status.as_str())
        .bind(lead.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to insert lead", e))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit transaction", e))?;

        Ok(ConversationWithLead {
            conversation,
            lead_id: lead.id,
            created: true,
        })
    }

    async fn set_conversation_status(
        &self,
        conversation_id: ConversationId,
        status: ConversationStatus,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE conversations SET
                status = $2,
                updated_at = GREATEST(updated_at, $3)
            WHERE id = $1
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(status.as_str())
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to update conversation status", e))?;

        if result.rows_affected() == 0 {
            return Err(conversation_not_found(conversation_id));
        }
        Ok(())
    }

    async fn complete_if_caught_up(
        &self,
        conversation_id: ConversationId,
        extracted_through: i64,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        // Appends lock the conversation row before inserting, so once this
        // lock is held every earlier append is committed and visible.
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM conversations WHERE id = $1 FOR UPDATE")
                .bind(conversation_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| DomainError::database("Failed to lock conversation", e))?;

        let Some(status) = status else {
            return Err(conversation_not_found(conversation_id));
        };
        if status.parse::<ConversationStatus>()? != ConversationStatus::Active {
            return Ok(false);
        }

        let newer_message: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM messages WHERE conversation_id = $1 AND sequence > $2)",
        )
        .bind(conversation_id.as_uuid())
        .bind(extracted_through)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to check for new messages", e))?;

        if newer_message {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE conversations SET
                status = 'completed',
                updated_at = GREATEST(updated_at, $2)
            WHERE id = $1
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(now.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to complete conversation", e))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit transaction", e))?;

        Ok(true)
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender: Sender,
        content: &str,
        now: Timestamp,
    ) -> Result<Message, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        let touched = sqlx::query(
            "UPDATE conversations SET updated_at = GREATEST(updated_at, $2) WHERE id = $1",
        )
        .bind(conversation_id.as_uuid())
        .bind(now.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to touch conversation", e))?;

        if touched.rows_affected() == 0 {
            return Err(conversation_not_found(conversation_id));
        }

        let id = MessageId::new();
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO messages (id, conversation_id, sender, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING sequence
            "#,
        )
        .bind(id.as_uuid())
        .bind(conversation_id.as_uuid())
        .bind(sender.as_str())
        .bind(content)
        .bind(now.as_datetime())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to insert message", e))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit transaction", e))?;

        Ok(Message {
            id,
            conversation_id,
            sender,
            content: content.to_string(),
            created_at: now,
            sequence,
        })
    }

    async fn load_transcript(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, sender, content, created_at, sequence
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, sequence ASC
            "#,
        )
        .bind(conversation_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load transcript", e))?;

        rows.into_iter().map(row_to_message).collect()
    }

    async fn message_timestamps(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Timestamp>, DomainError> {
        let stamps: Vec<chrono::DateTime<chrono::Utc>> = sqlx::query_scalar(
            r#"
            SELECT created_at FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, sequence ASC
            "#,
        )
        .bind(conversation_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load message timestamps", e))?;

        Ok(stamps.into_iter().map(Timestamp::from_datetime).collect())
    }

    async fn find_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Conversation>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM conversations WHERE id = $1",
            CONVERSATION_COLUMNS
        ))
        .bind(conversation_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch conversation", e))?;

        row.map(row_to_conversation).transpose()
    }

    async fn find_lead_by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Lead>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM leads WHERE conversation_id = $1",
            LEAD_COLUMNS
        ))
        .bind(conversation_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch lead", e))?;

        row.map(row_to_lead).transpose()
    }

    async fn update_lead(
        &self,
        conversation_id: ConversationId,
        patch: &LeadPatch,
    ) -> Result<bool, DomainError> {
        if patch.is_empty() {
            return Ok(false);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM leads WHERE conversation_id = $1 FOR UPDATE",
            LEAD_COLUMNS
        ))
        .bind(conversation_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to fetch lead", e))?;

        let mut lead = match row {
            Some(row) => row_to_lead(row)?,
            None => {
                return Err(
                    DomainError::new(ErrorCode::LeadNotFound, "No lead for conversation")
                        .with_detail("conversation_id", conversation_id.to_string()),
                )
            }
        };

        if !lead.apply(patch) {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE leads SET
                lead_type = $2,
                customer_name = $3,
                customer_phone = $4,
                details = $5,
                status = $6
            WHERE id = $1
            "#,
        )
        .bind(lead.id.as_uuid())
        .bind(lead.lead_type.as_str())
        .bind(&lead.customer_name)
        .bind(&lead.customer_phone)
        .bind(&lead.details)
        .bind(lead.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to update lead", e))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit transaction", e))?;

        Ok(true)
    }

    async fn list_active_conversations(
        &self,
        limit: usize,
    ) -> Result<Vec<Conversation>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversations \
             WHERE status = 'active' \
             ORDER BY last_evaluated_at ASC NULLS FIRST, updated_at ASC, id ASC \
             LIMIT $1",
            CONVERSATION_COLUMNS
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to list active conversations", e))?;

        rows.into_iter().map(row_to_conversation).collect()
    }

    async fn record_evaluations(
        &self,
        conversation_ids: &[ConversationId],
        now: Timestamp,
    ) -> Result<(), DomainError> {
        if conversation_ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = conversation_ids.iter().map(|id| *id.as_uuid()).collect();

        sqlx::query("UPDATE conversations SET last_evaluated_at = $2 WHERE id = ANY($1)")
            .bind(ids)
            .bind(now.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to record batch evaluations", e))?;

        Ok(())
    }

    async fn count_active_conversations(&self) -> Result<u64, DomainError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM conversations WHERE status = 'active'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| DomainError::database("Failed to count active conversations", e))?;

        Ok(count.0.max(0) as u64)
    }
}

fn conversation_not_found(id: ConversationId) -> DomainError {
    DomainError::new(ErrorCode::ConversationNotFound, "Conversation not found")
        .with_detail("conversation_id", id.to_string())
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column).map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get {}: {}", column, e),
        )
    })
}

fn row_to_conversation(row: PgRow) -> Result<Conversation, DomainError> {
    let status: String = get(&row, "status")?;
    let customer: String = get(&row, "customer_identifier")?;

    Ok(Conversation::reconstitute(
        ConversationId::from_uuid(get(&row, "id")?),
        TenantId::from_uuid(get(&row, "tenant_id")?),
        CustomerId::new(customer)?,
        status.parse()?,
        Timestamp::from_datetime(get(&row, "created_at")?),
        Timestamp::from_datetime(get(&row, "updated_at")?),
    ))
}

fn row_to_message(row: PgRow) -> Result<Message, DomainError> {
    let sender: String = get(&row, "sender")?;

    Ok(Message {
        id: MessageId::from_uuid(get(&row, "id")?),
        conversation_id: ConversationId::from_uuid(get(&row, "conversation_id")?),
        sender: sender.parse()?,
        content: get(&row, "content")?,
        created_at: Timestamp::from_datetime(get(&row, "created_at")?),
        sequence: get(&row, "sequence")?,
    })
}

fn row_to_lead(row: PgRow) -> Result<Lead, DomainError> {
    let lead_type: String = get(&row, "lead_type")?;
    let status: String = get(&row, "status")?;

    Ok(Lead {
        id: LeadId::from_uuid(get(&row, "id")?),
        tenant_id: TenantId::from_uuid(get(&row, "tenant_id")?),
        conversation_id: ConversationId::from_uuid(get(&row, "conversation_id")?),
        lead_type: lead_type.parse()?,
        customer_name: get(&row, "customer_name")?,
        customer_phone: get(&row, "customer_phone")?,
        details: get(&row, "details")?,
        status: status.parse()?,
        created_at: Timestamp::from_datetime(get(&row, "created_at")?),
    })
}
