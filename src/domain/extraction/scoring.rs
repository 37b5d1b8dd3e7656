//! Validation and scoring of extraction output.
//!
//! The model's own `confidence` is never trusted: it is recomputed from which
//! fields survived validation. Invalid contact fields are dropped one by one and
//! cost [`INVALID_FIELD_PENALTY`] points of lead score each.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::lead::{LeadPatch, PLACEHOLDER_NAME};

use super::user_info::{ModelExtraction, UserInfo};

/// Lead score deducted per contact field that fails validation.
pub const INVALID_FIELD_PENALTY: i32 = 20;

/// Confidence at or above which the lead (or score threshold) is updated.
pub const UPDATE_CONFIDENCE_THRESHOLD: u8 = 30;

/// Lead score at or above which the lead is updated.
pub const UPDATE_SCORE_THRESHOLD: u8 = 40;

/// Confidence at or above which a new lead is promoted to contacted.
pub const CONTACTED_CONFIDENCE_THRESHOLD: u8 = 60;

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[1-9]\d{7,14}$").expect("phone pattern compiles"));

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

/// Values the model uses to say "nothing here".
const EMPTY_MARKERS: &[&str] = &["", "unknown", "n/a", "na", "none", "null", "-", "not provided"];

/// A contact field that was discarded during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectedField {
    Phone,
    Email,
}

/// Validated, scored extraction ready to be merged into a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredExtraction {
    pub user_info: UserInfo,
    pub lead_score: u8,
    pub should_update_lead: bool,
    pub rejected_fields: Vec<RejectedField>,
}

/// Normalizes, validates and scores raw model output.
pub fn score(raw: ModelExtraction) -> ScoredExtraction {
    let info = raw.user_info;
    let mut rejected_fields = Vec::new();

    let phone = match clean(info.phone) {
        Some(value) => match normalize_phone(&value) {
            Some(phone) => Some(phone),
            None => {
                rejected_fields.push(RejectedField::Phone);
                None
            }
        },
        None => None,
    };

    let email = match clean(info.email) {
        Some(value) if is_valid_email(&value) => Some(value.to_lowercase()),
        Some(_) => {
            rejected_fields.push(RejectedField::Email);
            None
        }
        None => None,
    };

    let mut user_info = UserInfo {
        name: clean(info.name),
        phone,
        email,
        location: clean(info.location),
        company: clean(info.company),
        intent: info.intent,
        urgency: info.urgency,
        budget: clean(info.budget),
        preferences: info
            .preferences
            .into_iter()
            .filter_map(|p| clean(Some(p)))
            .collect(),
        follow_up_needed: info.follow_up_needed,
        confidence: 0,
    };
    user_info.confidence = compute_confidence(&user_info);

    let penalty = INVALID_FIELD_PENALTY * rejected_fields.len() as i32;
    let lead_score = (raw.lead_score.round() as i32 - penalty).clamp(0, 100) as u8;

    let should_update_lead = user_info.confidence >= UPDATE_CONFIDENCE_THRESHOLD
        || lead_score >= UPDATE_SCORE_THRESHOLD;

    ScoredExtraction {
        user_info,
        lead_score,
        should_update_lead,
        rejected_fields,
    }
}

/// Confidence from field presence: name 30, phone or email 40, intent 30.
pub fn compute_confidence(info: &UserInfo) -> u8 {
    let mut confidence: u32 = 0;
    if info.name.is_some() {
        confidence += 30;
    }
    if info.phone.is_some() || info.email.is_some() {
        confidence += 40;
    }
    if info.intent.is_some() {
        confidence += 30;
    }
    confidence.min(100) as u8
}

/// Returns true if the value looks like an E.164 number once separators are removed.
pub fn is_valid_phone(value: &str) -> bool {
    normalize_phone(value).is_some()
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value.trim())
}

fn normalize_phone(value: &str) -> Option<String> {
    let compact: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();
    PHONE_PATTERN.is_match(&compact).then_some(compact)
}

fn clean(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if EMPTY_MARKERS.iter().any(|m| trimmed.eq_ignore_ascii_case(m)) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Builds the non-destructive lead patch for a scored extraction.
pub fn build_lead_patch(scored: &ScoredExtraction) -> LeadPatch {
    let info = &scored.user_info;

    LeadPatch {
        customer_name: info
            .name
            .clone()
            .filter(|n| !n.eq_ignore_ascii_case(PLACEHOLDER_NAME)),
        customer_phone: info.phone.clone(),
        lead_type: info.intent.and_then(|intent| intent.lead_type()),
        details_append: details_block(info),
        promote_to_contacted: info.confidence >= CONTACTED_CONFIDENCE_THRESHOLD,
    }
}

fn details_block(info: &UserInfo) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(email) = &info.email {
        lines.push(format!("Email: {}", email));
    }
    if let Some(location) = &info.location {
        lines.push(format!("Location: {}", location));
    }
    if let Some(company) = &info.company {
        lines.push(format!("Company: {}", company));
    }
    if let Some(budget) = &info.budget {
        lines.push(format!("Budget: {}", budget));
    }
    if !info.preferences.is_empty() {
        lines.push(format!("Preferences: {}", info.preferences.join(", ")));
    }
    if let Some(urgency) = info.urgency {
        lines.push(format!("Urgency: {}", urgency.as_str()));
    }

    if lines.is_empty() {
        None
    } else {
        Some(format!("[Extracted details]\n{}", lines.join("\n")))
    }
}
