//! Reply drafting backed by an [`AIProvider`].

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::conversation::Sender;
use crate::ports::{
    AIError, AIProvider, CompletionRequest, FinishReason, MessageRole, ReplyContext,
    RequestMetadata, ResponseGenerator,
};

/// Number of trailing messages sent as context.
const DEFAULT_HISTORY_WINDOW: usize = 20;

const DEFAULT_MAX_TOKENS: u32 = 300;

/// [`ResponseGenerator`] that asks a language model for the next reply.
pub struct LlmResponseGenerator {
    provider: Arc<dyn AIProvider>,
    history_window: usize,
    max_tokens: u32,
}

impl LlmResponseGenerator {
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self {
            provider,
            history_window: DEFAULT_HISTORY_WINDOW,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_history_window(mut self, messages: usize) -> Self {
        self.history_window = messages.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn system_prompt(tenant_name: &str) -> String {
        format!(
            "You are the customer assistant for {}. Reply briefly and politely in the \
             customer's language. Ask for the customer's name and contact details when \
             they want to order or book something. Never invent prices or availability.",
            tenant_name
        )
    }

    fn build_request(&self, context: &ReplyContext) -> CompletionRequest {
        let skip = context.history.len().saturating_sub(self.history_window);

        let mut request = CompletionRequest::new(RequestMetadata::reply(
            context.tenant.id,
            context.conversation_id,
        ))
        .with_system_prompt(Self::system_prompt(&context.tenant.name))
        .with_max_tokens(self.max_tokens)
        .with_temperature(0.4);

        for message in context.history.iter().skip(skip) {
            let role = match message.sender {
                Sender::Customer => MessageRole::User,
                Sender::Bot => MessageRole::Assistant,
            };
            request = request.with_message(role, &message.content);
        }
        request
    }
}

#[async_trait]
impl ResponseGenerator for LlmResponseGenerator {
    async fn generate_reply(&self, context: ReplyContext) -> Result<String, AIError> {
        if context.latest_customer_message().is_none() {
            return Err(AIError::InvalidRequest(
                "no customer message to answer".to_string(),
            ));
        }

        let response = self.provider.complete(self.build_request(&context)).await?;

        match response.finish_reason {
            FinishReason::ContentFilter | FinishReason::Refusal => {
                return Err(AIError::content_filtered("reply was withheld by the provider"))
            }
            _ => {}
        }

        let reply = response.content.trim();
        if reply.is_empty() {
            return Err(AIError::parse("empty reply"));
        }
        Ok(reply.to_string())
    }
}
