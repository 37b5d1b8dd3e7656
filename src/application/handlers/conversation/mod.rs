//! Conversation handlers - find-or-create, status transitions and the message ledger.

mod append_message;
mod find_or_create;

pub use append_message::MessageLedger;
pub use find_or_create::{ConversationGateway, ConversationHandle, ConversationOrigin};
