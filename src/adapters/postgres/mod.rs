//! PostgreSQL adapters - Database implementations for storage ports.
//!
//! - `PostgresConversationStore` - tenants, conversations, messages and leads

mod conversation_store;

pub use conversation_store::PostgresConversationStore;
