//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - OpenAI-compatible language model provider and reply generator
//! - `counter_store` - Rate limit counters (in-memory, Redis)
//! - `memory` - In-memory conversation store
//! - `postgres` - PostgreSQL conversation store
//! - `http` - axum routers for the webhook, administration and extraction

pub mod ai;
pub mod counter_store;
pub mod http;
pub mod memory;
pub mod postgres;
