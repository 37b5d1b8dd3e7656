//! Lead module - business opportunities derived from conversations.

mod lead;
mod patch;

pub use lead::{append_details, Lead, LeadStatus, LeadType, PLACEHOLDER_NAME};
pub use patch::LeadPatch;
