//! LeadExtractor - turns a conversation transcript into lead data.
//!
//! The conversation's `completed` status is the only idempotence gate:
//! a completed conversation is skipped unless the caller forces a re-run.
//! Failed extractions leave the conversation active so a later pass retries,
//! and so does a customer message that lands while the model is running.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};

use crate::application::handlers::conversation::ConversationGateway;
use crate::domain::conversation::{render_transcript, ConversationStatus};
use crate::domain::extraction::{
    build_lead_patch, extraction_schema, score, ModelExtraction, ScoredExtraction,
    EXTRACTION_SCHEMA_NAME,
};
use crate::domain::foundation::{ConversationId, DomainError};
use crate::ports::{
    AIError, AIProvider, CompletionRequest, ConversationStore, FinishReason, MessageRole,
    RequestMetadata, ResponseFormat,
};

const EXTRACTION_PROMPT: &str = "You extract customer details from a support conversation \
between a business assistant and a customer. Only report what the customer actually stated. \
Use null for anything not mentioned and an empty list when no preferences were given. \
intent is one of inquiry, booking, order or support. leadScore is 0-100 and rates how likely \
the conversation leads to business.";

const EXTRACTION_MAX_TOKENS: u32 = 600;

/// Command to extract lead data from one conversation.
#[derive(Debug, Clone, Copy)]
pub struct ExtractLeadCommand {
    pub conversation_id: ConversationId,
    /// Re-run even if the conversation is already completed.
    pub force: bool,
}

impl ExtractLeadCommand {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            force: false,
        }
    }

    pub fn forced(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            force: true,
        }
    }
}

/// Errors that leave the conversation untouched.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// Nothing to extract from; the model is not called.
    #[error("conversation {0} has no messages")]
    EmptyTranscript(ConversationId),

    #[error("model call failed: {0}")]
    Model(#[from] AIError),

    /// The model answered, but not in the required shape.
    #[error("model output does not match the extraction schema: {0}")]
    NonConforming(String),

    #[error("store error: {0}")]
    Store(#[from] DomainError),
}

impl ExtractionError {
    /// Stable machine-readable code for reports and HTTP payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ExtractionError::ConversationNotFound(_) => "CONVERSATION_NOT_FOUND",
            ExtractionError::EmptyTranscript(_) => "EMPTY_TRANSCRIPT",
            ExtractionError::Model(_) => "MODEL_ERROR",
            ExtractionError::NonConforming(_) => "NON_CONFORMING_OUTPUT",
            ExtractionError::Store(_) => "STORE_ERROR",
        }
    }
}

/// Successful outcome of [`LeadExtractor::extract`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    /// The model ran and its result was merged into the lead.
    Extracted {
        extraction: ScoredExtraction,
        lead_updated: bool,
        /// False when the conversation stayed open, for example because a
        /// newer message arrived during the model call.
        completed: bool,
    },
    /// Skipped by the completed-status gate; no model call was made.
    AlreadyCompleted,
}

/// Runs extraction for single conversations.
pub struct LeadExtractor {
    store: Arc<dyn ConversationStore>,
    gateway: ConversationGateway,
    provider: Arc<dyn AIProvider>,
}

impl LeadExtractor {
    pub fn new(store: Arc<dyn ConversationStore>, provider: Arc<dyn AIProvider>) -> Self {
        Self {
            gateway: ConversationGateway::new(store.clone()),
            store,
            provider,
        }
    }

    pub async fn extract(
        &self,
        cmd: ExtractLeadCommand,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        self.run(cmd, None).await
    }

    /// Like [`extract`](Self::extract), but the model call is abandoned at `deadline`.
    ///
    /// Only the side-effect free model call is bounded; once an answer is in,
    /// the lead merge and status change always complete.
    pub async fn extract_before(
        &self,
        cmd: ExtractLeadCommand,
        deadline: Instant,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        self.run(cmd, Some(deadline)).await
    }

    async fn run(
        &self,
        cmd: ExtractLeadCommand,
        deadline: Option<Instant>,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let id = cmd.conversation_id;

        let conversation = self
            .store
            .find_conversation(id)
            .await?
            .ok_or(ExtractionError::ConversationNotFound(id))?;

        if conversation.is_completed() && !cmd.force {
            tracing::debug!(conversation_id = %id, "Extraction skipped: already completed");
            return Ok(ExtractionOutcome::AlreadyCompleted);
        }

        let transcript = self.store.load_transcript(id).await?;
        let Some(extracted_through) = transcript.iter().map(|m| m.sequence).max() else {
            return Err(ExtractionError::EmptyTranscript(id));
        };

        let request = CompletionRequest::new(RequestMetadata::extraction(id))
            .with_system_prompt(EXTRACTION_PROMPT)
            .with_message(MessageRole::User, render_transcript(&transcript))
            .with_max_tokens(EXTRACTION_MAX_TOKENS)
            .with_temperature(0.0)
            .with_response_format(ResponseFormat::json_schema(
                EXTRACTION_SCHEMA_NAME,
                extraction_schema(),
            ));

        let response = match deadline {
            Some(deadline) => {
                let budget = deadline.saturating_duration_since(Instant::now());
                timeout_at(deadline, self.provider.complete(request))
                    .await
                    .map_err(|_| AIError::Timeout {
                        timeout_secs: budget.as_secs() as u32,
                    })??
            }
            None => self.provider.complete(request).await?,
        };

        match response.finish_reason {
            FinishReason::Stop => {}
            other => {
                return Err(ExtractionError::NonConforming(format!(
                    "model stopped with {:?}",
                    other
                )))
            }
        }

        let raw = ModelExtraction::parse(&response.content)
            .map_err(|e| ExtractionError::NonConforming(e.to_string()))?;
        let scored = score(raw);

        if !scored.rejected_fields.is_empty() {
            tracing::debug!(
                conversation_id = %id,
                rejected = ?scored.rejected_fields,
                "Invalid contact fields dropped"
            );
        }

        let lead_updated = if scored.should_update_lead {
            self.store
                .update_lead(id, &build_lead_patch(&scored))
                .await?
        } else {
            false
        };

        let completed = if conversation.status() == ConversationStatus::Active {
            self.gateway
                .mark_completed(&conversation, extracted_through)
                .await?
        } else {
            conversation.is_completed()
        };

        tracing::info!(
            conversation_id = %id,
            confidence = scored.user_info.confidence,
            lead_score = scored.lead_score,
            lead_updated,
            completed,
            "Lead extracted"
        );

        Ok(ExtractionOutcome::Extracted {
            extraction: scored,
            lead_updated,
            completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockAIProvider;
    use crate::adapters::memory::InMemoryConversationStore;
    use crate::application::handlers::conversation::ConversationOrigin;
    use crate::domain::conversation::Sender;
    use crate::domain::foundation::{CustomerId, TenantId, Timestamp};
    use crate::domain::lead::{LeadStatus, LeadType};
    use serde_json::json;
    use std::time::Duration;

    fn model_output(name: Option<&str>, phone: Option<&str>, intent: Option<&str>, score: u32) -> String {
        json!({
            "userInfo": {
                "name": name,
                "phone": phone,
                "email": null,
                "location": null,
                "company": null,
                "intent": intent,
                "urgency": null,
                "budget": null,
                "preferences": [],
                "followUpNeeded": false,
                "confidence": 0.5
            },
            "shouldUpdateLead": true,
            "leadScore": score
        })
        .to_string()
    }

    async fn conversation_with(
        store: &InMemoryConversationStore,
        messages: &[&str],
    ) -> ConversationId {
        let created = store
            .create_conversation_with_lead(
                TenantId::new(),
                &CustomerId::new("+201234567890").unwrap(),
                messages.first().copied().unwrap_or(""),
                Timestamp::now(),
            )
            .await
            .unwrap();
        let id = created.conversation.id();
        for message in messages {
            store
                .append_message(id, Sender::Customer, message, Timestamp::now())
                .await
                .unwrap();
        }
        id
    }

    #[tokio::test]
    async fn sara_booking_updates_lead_and_completes() {
        let store = Arc::new(InMemoryConversationStore::new());
        let id = conversation_with(&store, &["Hi, I'm Sara, +201234567890, I want to book"]).await;
        let mock = Arc::new(MockAIProvider::new().with_response(model_output(
            Some("Sara"),
            Some("+201234567890"),
            Some("booking"),
            50,
        )));
        let extractor = LeadExtractor::new(store.clone(), mock.clone());

        let outcome = extractor.extract(ExtractLeadCommand::new(id)).await.unwrap();

        match outcome {
            ExtractionOutcome::Extracted {
                extraction,
                lead_updated,
                completed,
            } => {
                assert_eq!(extraction.user_info.confidence, 100);
                assert!(lead_updated);
                assert!(completed);
            }
            ExtractionOutcome::AlreadyCompleted => panic!("expected extraction"),
        }
        let lead = store.find_lead_by_conversation(id).await.unwrap().unwrap();
        assert_eq!(lead.customer_name, "Sara");
        assert_eq!(lead.lead_type, LeadType::Booking);
        assert_eq!(lead.status, LeadStatus::Contacted);

        let conversation = store.find_conversation(id).await.unwrap().unwrap();
        assert_eq!(conversation.status(), ConversationStatus::Completed);

        let call = &mock.get_calls()[0];
        assert!(call.response_format.is_structured());
        assert!(call.messages[0].content.contains("Customer: Hi, I'm Sara"));
    }

    #[tokio::test]
    async fn second_call_short_circuits() {
        let store = Arc::new(InMemoryConversationStore::new());
        let id = conversation_with(&store, &["hello"]).await;
        let mock = Arc::new(MockAIProvider::new().with_response(model_output(None, None, None, 10)));
        let extractor = LeadExtractor::new(store, mock.clone());

        extractor.extract(ExtractLeadCommand::new(id)).await.unwrap();
        let second = extractor.extract(ExtractLeadCommand::new(id)).await.unwrap();

        assert!(matches!(second, ExtractionOutcome::AlreadyCompleted));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn force_reruns_completed_conversation() {
        let store = Arc::new(InMemoryConversationStore::new());
        let id = conversation_with(&store, &["hello"]).await;
        let mock = Arc::new(
            MockAIProvider::new()
                .with_response(model_output(None, None, None, 10))
                .with_response(model_output(Some("Omar"), None, None, 10)),
        );
        let extractor = LeadExtractor::new(store.clone(), mock.clone());

        extractor.extract(ExtractLeadCommand::new(id)).await.unwrap();
        extractor.extract(ExtractLeadCommand::forced(id)).await.unwrap();

        assert_eq!(mock.call_count(), 2);
        let lead = store.find_lead_by_conversation(id).await.unwrap().unwrap();
        assert_eq!(lead.customer_name, "Omar");
    }

    #[tokio::test]
    async fn invalid_phone_never_reaches_the_lead() {
        let store = Arc::new(InMemoryConversationStore::new());
        let id = conversation_with(&store, &["I'm Sara, call me maybe"]).await;
        let mock = Arc::new(MockAIProvider::new().with_response(model_output(
            Some("Sara"),
            Some("not-a-number"),
            None,
            50,
        )));
        let extractor = LeadExtractor::new(store.clone(), mock);

        let outcome = extractor.extract(ExtractLeadCommand::new(id)).await.unwrap();
        let ExtractionOutcome::Extracted { extraction, .. } = outcome else {
            panic!("expected extraction");
        };
        assert_eq!(extraction.lead_score, 30);

        let lead = store.find_lead_by_conversation(id).await.unwrap().unwrap();
        assert_ne!(lead.customer_phone, "not-a-number");
        assert_eq!(lead.customer_phone, "+201234567890");
    }

    #[tokio::test]
    async fn empty_transcript_does_not_call_model() {
        let store = Arc::new(InMemoryConversationStore::new());
        let id = conversation_with(&store, &[]).await;
        let mock = Arc::new(MockAIProvider::new());
        let extractor = LeadExtractor::new(store.clone(), mock.clone());

        let err = extractor.extract(ExtractLeadCommand::new(id)).await.unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyTranscript(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn non_conforming_output_leaves_conversation_active() {
        let store = Arc::new(InMemoryConversationStore::new());
        let id = conversation_with(&store, &["hello"]).await;
        let mock = Arc::new(MockAIProvider::new().with_response("Sure! The customer is Sara."));
        let extractor = LeadExtractor::new(store.clone(), mock);

        let err = extractor.extract(ExtractLeadCommand::new(id)).await.unwrap_err();
        assert_eq!(err.code(), "NON_CONFORMING_OUTPUT");

        let conversation = store.find_conversation(id).await.unwrap().unwrap();
        assert_eq!(conversation.status(), ConversationStatus::Active);
    }

    #[tokio::test]
    async fn refusal_is_non_conforming() {
        let store = Arc::new(InMemoryConversationStore::new());
        let id = conversation_with(&store, &["hello"]).await;
        let mock = Arc::new(MockAIProvider::new().with_response_full("", FinishReason::Refusal));
        let extractor = LeadExtractor::new(store, mock);

        let err = extractor.extract(ExtractLeadCommand::new(id)).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NonConforming(_)));
    }

    #[tokio::test]
    async fn model_error_leaves_conversation_active() {
        let store = Arc::new(InMemoryConversationStore::new());
        let id = conversation_with(&store, &["hello"]).await;
        let mock = Arc::new(MockAIProvider::new().with_error(AIError::unavailable("down")));
        let extractor = LeadExtractor::new(store.clone(), mock);

        let err = extractor.extract(ExtractLeadCommand::new(id)).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Model(_)));
        let conversation = store.find_conversation(id).await.unwrap().unwrap();
        assert_eq!(conversation.status(), ConversationStatus::Active);
    }

    #[tokio::test]
    async fn low_signal_extraction_completes_without_lead_write() {
        let store = Arc::new(InMemoryConversationStore::new());
        let id = conversation_with(&store, &["just browsing"]).await;
        let mock = Arc::new(MockAIProvider::new().with_response(model_output(None, None, None, 10)));
        let extractor = LeadExtractor::new(store.clone(), mock);

        let outcome = extractor.extract(ExtractLeadCommand::new(id)).await.unwrap();
        assert!(matches!(
            outcome,
            ExtractionOutcome::Extracted { lead_updated: false, .. }
        ));
        let conversation = store.find_conversation(id).await.unwrap().unwrap();
        assert!(conversation.is_completed());
    }

    #[tokio::test]
    async fn deadline_bounds_the_model_call() {
        let store = Arc::new(InMemoryConversationStore::new());
        let id = conversation_with(&store, &["hello"]).await;
        let mock = Arc::new(MockAIProvider::new().with_delay(Duration::from_millis(500)));
        let extractor = LeadExtractor::new(store.clone(), mock);

        let deadline = Instant::now() + Duration::from_millis(20);
        let err = extractor
            .extract_before(ExtractLeadCommand::new(id), deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Model(AIError::Timeout { .. })));
        let conversation = store.find_conversation(id).await.unwrap().unwrap();
        assert_eq!(conversation.status(), ConversationStatus::Active);
    }

    #[tokio::test]
    async fn message_during_model_call_keeps_conversation_open() {
        let store = Arc::new(InMemoryConversationStore::new());
        let tenant = TenantId::new();
        let customer = CustomerId::new("+201234567890").unwrap();
        let gateway = ConversationGateway::new(store.clone());

        let first = gateway.find_or_create(tenant, &customer, "hello").await.unwrap();
        let id = first.conversation.id();
        store
            .append_message(id, Sender::Customer, "hello", Timestamp::now())
            .await
            .unwrap();

        let mock = Arc::new(
            MockAIProvider::new()
                .with_response(model_output(None, None, Some("inquiry"), 50))
                .with_response(model_output(None, None, Some("inquiry"), 50))
                .with_delay(Duration::from_millis(200)),
        );
        let extractor = LeadExtractor::new(store.clone(), mock.clone());

        let extraction = tokio::spawn(async move {
            extractor.extract(ExtractLeadCommand::new(id)).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let during = gateway.find_or_create(tenant, &customer, "are you open tomorrow?").await.unwrap();
        assert_eq!(during.origin, ConversationOrigin::Existing);
        store
            .append_message(id, Sender::Customer, "are you open tomorrow?", Timestamp::now())
            .await
            .unwrap();

        let outcome = extraction.await.unwrap().unwrap();
        assert!(matches!(
            outcome,
            ExtractionOutcome::Extracted { completed: false, .. }
        ));

        let conversation = store.find_conversation(id).await.unwrap().unwrap();
        assert_eq!(conversation.status(), ConversationStatus::Active);
        assert_eq!(store.load_transcript(id).await.unwrap().len(), 2);

        // The next run sees the new message and closes the conversation.
        let extractor = LeadExtractor::new(store.clone(), mock.clone());
        let outcome = extractor.extract(ExtractLeadCommand::new(id)).await.unwrap();
        assert!(matches!(
            outcome,
            ExtractionOutcome::Extracted { completed: true, .. }
        ));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn missing_conversation_is_reported() {
        let store = Arc::new(InMemoryConversationStore::new());
        let extractor = LeadExtractor::new(store, Arc::new(MockAIProvider::new()));
        let err = extractor
            .extract(ExtractLeadCommand::new(ConversationId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ConversationNotFound(_)));
    }
}
