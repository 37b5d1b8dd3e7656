//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `conversation` - Conversation lifecycle and messages
//! - `lead` - Leads and non-destructive lead patches
//! - `extraction` - Extraction trigger, model output contract and scoring

pub mod conversation;
pub mod extraction;
pub mod foundation;
pub mod lead;
