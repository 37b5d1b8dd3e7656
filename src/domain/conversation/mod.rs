//! Conversation module - customer conversations and their messages.

mod conversation;
mod message;
mod status;

pub use conversation::Conversation;
pub use message::{render_transcript, sort_chronologically, Message, Sender};
pub use status::ConversationStatus;
