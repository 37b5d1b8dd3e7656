//! In-memory adapters for tests and single-instance development.

mod conversation_store;

pub use conversation_store::InMemoryConversationStore;
