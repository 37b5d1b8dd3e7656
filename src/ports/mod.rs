//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `CounterStore` - Atomic expiring counters for rate limiting
//! - `ConversationStore` - Tenants, conversations, messages and leads
//!
//! ## Language Model Ports
//!
//! - `AIProvider` - Completions, including strict structured output
//! - `ResponseGenerator` - Customer reply drafting

mod ai_provider;
mod conversation_store;
mod counter_store;
mod response_generator;

pub use ai_provider::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, Message,
    MessageRole, ProviderInfo, RequestMetadata, RequestPurpose, ResponseFormat, TokenUsage,
};
pub use conversation_store::{ConversationStore, ConversationWithLead, Tenant};
pub use counter_store::{CounterStore, CounterStoreError};
pub use response_generator::{ReplyContext, ResponseGenerator};
