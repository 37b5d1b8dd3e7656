//! BatchScheduler - periodic pass over active conversations.
//!
//! Each pass picks up to `max` active conversations (least recently evaluated
//! first), asks the [`ExtractionTrigger`] whether each is ready and extracts
//! the ready ones. Every conversation a pass looks at is stamped as evaluated,
//! so repeated passes rotate through the whole active set. When the
//! wall-clock budget runs out the remaining conversations are left for the
//! next pass and `has_more` is set.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::domain::conversation::Conversation;
use crate::domain::extraction::{ExtractionTrigger, TriggerKind};
use crate::domain::foundation::{ConversationId, DomainError, Timestamp};
use crate::ports::ConversationStore;

use super::extract_lead::{ExtractLeadCommand, ExtractionOutcome, LeadExtractor};

/// What happened to one conversation during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchItemStatus {
    Extracted,
    NotReady,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub conversation_id: ConversationId,
    pub status: BatchItemStatus,
    pub trigger: TriggerKind,
    pub reason: String,
}

/// Summary of one [`BatchScheduler::run_batch`] pass.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Conversations evaluated (ready or not).
    pub processed: usize,
    pub extracted: usize,
    pub errors: usize,
    pub has_more: bool,
    /// True if the pass stopped early because the time budget ran out.
    pub budget_exhausted: bool,
    pub results: Vec<BatchItem>,
}

/// Runs bounded extraction passes.
pub struct BatchScheduler {
    store: Arc<dyn ConversationStore>,
    extractor: Arc<LeadExtractor>,
    trigger: ExtractionTrigger,
    batch_size: usize,
    time_budget: Duration,
}

impl BatchScheduler {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        extractor: Arc<LeadExtractor>,
        trigger: ExtractionTrigger,
        batch_size: usize,
        time_budget: Duration,
    ) -> Self {
        Self {
            store,
            extractor,
            trigger,
            batch_size: batch_size.max(1),
            time_budget,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Runs one pass over at most `max` (default: configured batch size) conversations.
    pub async fn run_batch(&self, max: Option<usize>) -> Result<BatchReport, DomainError> {
        let limit = max.unwrap_or(self.batch_size).max(1);
        let deadline = Instant::now() + self.time_budget;

        let total_active = self.store.count_active_conversations().await?;
        let conversations = self.store.list_active_conversations(limit).await?;

        let mut report = BatchReport {
            processed: 0,
            extracted: 0,
            errors: 0,
            has_more: total_active > limit as u64,
            budget_exhausted: false,
            results: Vec::with_capacity(conversations.len()),
        };

        for conversation in conversations {
            if Instant::now() >= deadline {
                report.budget_exhausted = true;
                break;
            }

            let item = self.evaluate(&conversation, deadline).await;
            report.processed += 1;
            match item.status {
                BatchItemStatus::Extracted => report.extracted += 1,
                BatchItemStatus::Failed => report.errors += 1,
                BatchItemStatus::NotReady | BatchItemStatus::Skipped => {}
            }
            report.results.push(item);
        }

        if report.budget_exhausted {
            report.has_more = true;
        }

        // Evaluated conversations go to the back of the queue, so ones that
        // keep failing or have nothing to extract cannot starve the rest.
        let evaluated: Vec<ConversationId> =
            report.results.iter().map(|item| item.conversation_id).collect();
        if let Err(err) = self
            .store
            .record_evaluations(&evaluated, Timestamp::now())
            .await
        {
            tracing::warn!(error = %err, "Failed to record batch evaluations");
        }

        tracing::info!(
            processed = report.processed,
            extracted = report.extracted,
            errors = report.errors,
            has_more = report.has_more,
            budget_exhausted = report.budget_exhausted,
            "Extraction batch finished"
        );
        Ok(report)
    }

    async fn evaluate(&self, conversation: &Conversation, deadline: Instant) -> BatchItem {
        let id = conversation.id();
        let item = |status, trigger, reason: String| BatchItem {
            conversation_id: id,
            status,
            trigger,
            reason,
        };

        let timestamps = match self.store.message_timestamps(id).await {
            Ok(timestamps) => timestamps,
            Err(err) => {
                tracing::warn!(conversation_id = %id, error = %err, "Failed to load message timestamps");
                return item(BatchItemStatus::Failed, TriggerKind::None, err.to_string());
            }
        };

        let (Some(first), Some(last)) = (timestamps.iter().min(), timestamps.iter().max()) else {
            return item(BatchItemStatus::Skipped, TriggerKind::None, "no messages".to_string());
        };

        let decision = self
            .trigger
            .decide(*last, *first, conversation.is_completed(), Timestamp::now());
        if !decision.should_extract {
            return item(BatchItemStatus::NotReady, decision.kind, decision.reason);
        }

        match self
            .extractor
            .extract_before(ExtractLeadCommand::new(id), deadline)
            .await
        {
            Ok(ExtractionOutcome::Extracted { .. }) => {
                item(BatchItemStatus::Extracted, decision.kind, decision.reason)
            }
            Ok(ExtractionOutcome::AlreadyCompleted) => item(
                BatchItemStatus::Skipped,
                decision.kind,
                "already completed".to_string(),
            ),
            Err(err) => {
                tracing::warn!(
                    conversation_id = %id,
                    code = err.code(),
                    error = %err,
                    "Lead extraction failed"
                );
                item(BatchItemStatus::Failed, decision.kind, err.to_string())
            }
        }
    }
}

/// Runs passes every `poll_interval` until `shutdown` flips to true.
///
/// A pass that reports `has_more` after making progress is followed
/// immediately by another one.
/// Shutdown is honoured between passes, never in the middle of one.
pub async fn run_scheduler(
    scheduler: Arc<BatchScheduler>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(
        poll_interval_secs = poll_interval.as_secs(),
        batch_size = scheduler.batch_size(),
        "Extraction scheduler started"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        let has_more = match scheduler.run_batch(None).await {
            Ok(report) => report.has_more && (report.extracted > 0 || report.budget_exhausted),
            Err(err) => {
                tracing::error!(error = %err, "Extraction batch failed");
                false
            }
        };

        if has_more {
            tokio::task::yield_now().await;
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!("Extraction scheduler stopped");
}
