//! Lead extraction domain: when to extract, what the model must return,
//! and how its answer is validated and scored.

mod schema;
mod scoring;
mod trigger;
mod user_info;

pub use schema::{extraction_schema, EXTRACTION_SCHEMA_NAME};
pub use scoring::{
    build_lead_patch, compute_confidence, is_valid_email, is_valid_phone, score, RejectedField,
    ScoredExtraction, CONTACTED_CONFIDENCE_THRESHOLD, INVALID_FIELD_PENALTY,
    UPDATE_CONFIDENCE_THRESHOLD, UPDATE_SCORE_THRESHOLD,
};
pub use trigger::{ExtractionTrigger, TriggerDecision, TriggerKind};
pub use user_info::{Intent, ModelExtraction, ModelUserInfo, Urgency, UserInfo};
