//! AI adapters - Language model provider implementations.
//!
//! - `OpenAIProvider` - OpenAI-compatible chat completions with strict JSON schema output
//! - `MockAIProvider` - queued responses for tests
//! - `LlmResponseGenerator` - drafts customer replies through any provider

mod mock_provider;
mod openai_provider;
mod response_generator;

pub use mock_provider::{MockAIProvider, MockResponse};
pub use openai_provider::{OpenAIConfig, OpenAIProvider};
pub use response_generator::LlmResponseGenerator;
