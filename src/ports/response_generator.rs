//! Response generator port - drafts the reply sent back to the customer.
//!
//! The generator is an external collaborator; ingestion only relies on it
//! returning text or an error, and wraps every call in a timeout.

use async_trait::async_trait;

use crate::domain::conversation::{Message, Sender};
use crate::domain::foundation::ConversationId;

use super::{AIError, Tenant};

/// Port for reply generation.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Produces the reply to the latest customer message.
    async fn generate_reply(&self, context: ReplyContext) -> Result<String, AIError>;
}

/// Everything a generator may look at to answer.
#[derive(Debug, Clone)]
pub struct ReplyContext {
    pub tenant: Tenant,
    pub conversation_id: ConversationId,
    /// Chronological history, including the message being answered.
    pub history: Vec<Message>,
}

impl ReplyContext {
    /// The customer message being answered.
    pub fn latest_customer_message(&self) -> Option<&Message> {
        self.history
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Customer)
    }
}
