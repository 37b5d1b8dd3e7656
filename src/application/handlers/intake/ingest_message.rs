//! IngestMessage handler - the per-message pipeline behind the transport webhook.
//!
//! rate limit → tenant → find-or-create → append(customer) → reply → append(bot)
//!
//! The caller always gets a reply text back. Internal failures are logged and
//! answered with the configured fallback reply.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::application::handlers::conversation::{ConversationGateway, MessageLedger};
use crate::application::handlers::rate_limit::{RateLimitDecision, RateLimiter};
use crate::config::WebhookConfig;
use crate::domain::conversation::Sender;
use crate::domain::foundation::{ConversationId, CustomerId, DomainError, ValidationError};
use crate::ports::{ConversationStore, ReplyContext, ResponseGenerator};

/// Inbound notification from the message transport.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// The business's receiving identifier.
    pub target: String,
    pub sender: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyDisposition {
    /// The generated reply was sent.
    Replied,
    /// The sender hit a rate limit; nothing was stored.
    RateLimited,
    /// Something failed; the fallback reply was sent.
    Fallback,
}

/// What goes back to the transport.
#[derive(Debug, Clone, Serialize)]
pub struct InboundReply {
    pub reply: String,
    pub disposition: ReplyDisposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

/// Reply timeout and fallback text.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub reply_timeout: Duration,
    pub fallback_reply: String,
}

impl From<&WebhookConfig> for IngestSettings {
    fn from(config: &WebhookConfig) -> Self {
        Self {
            reply_timeout: config.reply_timeout(),
            fallback_reply: config.fallback_reply.clone(),
        }
    }
}

#[derive(Debug, Error)]
enum IngestFailure {
    #[error("message body is empty")]
    EmptyBody,

    #[error("invalid sender: {0}")]
    InvalidSender(#[from] ValidationError),

    #[error("no active tenant for target")]
    UnknownTenant,

    #[error(transparent)]
    Store(#[from] DomainError),
}

/// Handles one inbound message end to end.
pub struct IngestMessageHandler {
    rate_limiter: Arc<RateLimiter>,
    store: Arc<dyn ConversationStore>,
    gateway: ConversationGateway,
    ledger: MessageLedger,
    generator: Arc<dyn ResponseGenerator>,
    settings: IngestSettings,
}

impl IngestMessageHandler {
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        store: Arc<dyn ConversationStore>,
        generator: Arc<dyn ResponseGenerator>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            rate_limiter,
            gateway: ConversationGateway::new(store.clone()),
            ledger: MessageLedger::new(store.clone()),
            store,
            generator,
            settings,
        }
    }

    pub async fn handle(&self, message: InboundMessage) -> InboundReply {
        let target = message.target.trim();
        let sender = message.sender.trim();

        let decision = self.rate_limiter.check(target, sender).await;
        if !decision.allowed {
            tracing::info!(
                target = %target,
                sender = %sender,
                reason = ?decision.reason,
                "Inbound message rate limited"
            );
            return InboundReply {
                reply: rate_limited_reply(&decision),
                disposition: ReplyDisposition::RateLimited,
                conversation_id: None,
            };
        }

        match self.process(target, sender, &message.body).await {
            Ok(reply) => reply,
            Err(failure) => {
                match &failure {
                    IngestFailure::Store(err) => {
                        tracing::error!(target = %target, error = %err, "Inbound message failed")
                    }
                    other => {
                        tracing::warn!(target = %target, error = %other, "Inbound message rejected")
                    }
                }
                self.fallback(None)
            }
        }
    }

    async fn process(
        &self,
        target: &str,
        sender: &str,
        body: &str,
    ) -> Result<InboundReply, IngestFailure> {
        let body = body.trim();
        if body.is_empty() {
            return Err(IngestFailure::EmptyBody);
        }
        let customer = CustomerId::new(sender)?;

        let tenant = self
            .store
            .resolve_tenant(target)
            .await?
            .ok_or(IngestFailure::UnknownTenant)?;

        let handle = self.gateway.find_or_create(tenant.id, &customer, body).await?;
        let conversation_id = handle.conversation.id();

        self.ledger
            .append(conversation_id, Sender::Customer, body)
            .await?;
        let history = self.ledger.transcript(conversation_id).await?;

        let context = ReplyContext {
            tenant,
            conversation_id,
            history,
        };
        let generated =
            tokio::time::timeout(self.settings.reply_timeout, self.generator.generate_reply(context))
                .await;

        let (reply, disposition) = match generated {
            Ok(Ok(reply)) => (reply, ReplyDisposition::Replied),
            Ok(Err(err)) => {
                tracing::warn!(conversation_id = %conversation_id, error = %err, "Reply generation failed");
                (self.settings.fallback_reply.clone(), ReplyDisposition::Fallback)
            }
            Err(_) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    timeout_secs = self.settings.reply_timeout.as_secs(),
                    "Reply generation timed out"
                );
                (self.settings.fallback_reply.clone(), ReplyDisposition::Fallback)
            }
        };

        // The customer gets the reply even if recording it fails.
        if let Err(err) = self.ledger.append(conversation_id, Sender::Bot, &reply).await {
            tracing::error!(conversation_id = %conversation_id, error = %err, "Failed to record reply");
        }

        Ok(InboundReply {
            reply,
            disposition,
            conversation_id: Some(conversation_id),
        })
    }

    fn fallback(&self, conversation_id: Option<ConversationId>) -> InboundReply {
        InboundReply {
            reply: self.settings.fallback_reply.clone(),
            disposition: ReplyDisposition::Fallback,
            conversation_id,
        }
    }
}

fn rate_limited_reply(decision: &RateLimitDecision) -> String {
    format!(
        "You've sent several messages in a short time. Please try again after {} UTC.",
        decision.reset_at.clock_utc()
    )
}
