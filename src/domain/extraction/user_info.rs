//! Structured output returned by the extraction model, and its validated form.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::lead::LeadType;

/// What the customer wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Inquiry,
    Booking,
    Order,
    Support,
}

impl Intent {
    /// Maps to a lead type; support requests have no lead counterpart.
    pub fn lead_type(&self) -> Option<LeadType> {
        match self {
            Intent::Inquiry => Some(LeadType::Inquiry),
            Intent::Booking => Some(LeadType::Booking),
            Intent::Order => Some(LeadType::Order),
            Intent::Support => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        }
    }
}

/// `userInfo` object exactly as the model returns it.
///
/// Every key is required; absent information arrives as `null`.
/// `Option::deserialize` makes a missing key a parse error instead of `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModelUserInfo {
    #[serde(deserialize_with = "Option::deserialize")]
    pub name: Option<String>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub email: Option<String>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub location: Option<String>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub company: Option<String>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub intent: Option<Intent>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub urgency: Option<Urgency>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub budget: Option<String>,
    pub preferences: Vec<String>,
    pub follow_up_needed: bool,
    pub confidence: f64,
}

/// Top-level structured output of the extraction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModelExtraction {
    pub user_info: ModelUserInfo,
    pub should_update_lead: bool,
    #[serde(deserialize_with = "finite_number")]
    pub lead_score: f64,
}

fn finite_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(serde::de::Error::custom("leadScore must be a finite number"))
    }
}

impl ModelExtraction {
    /// Parses the raw model content, tolerating a surrounding markdown code fence.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(strip_code_fence(content))
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Customer information after normalization and validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub intent: Option<Intent>,
    pub urgency: Option<Urgency>,
    pub budget: Option<String>,
    pub preferences: Vec<String>,
    pub follow_up_needed: bool,
    /// Deterministic 0-100 confidence recomputed from field presence.
    pub confidence: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_payload() -> serde_json::Value {
        json!({
            "userInfo": {
                "name": "Sara",
                "phone": "+201234567890",
                "email": null,
                "location": null,
                "company": null,
                "intent": "booking",
                "urgency": null,
                "budget": null,
                "preferences": [],
                "followUpNeeded": true,
                "confidence": 0.9
            },
            "shouldUpdateLead": true,
            "leadScore": 70
        })
    }

    #[test]
    fn parses_conforming_output() {
        let parsed = ModelExtraction::parse(&full_payload().to_string()).unwrap();
        assert_eq!(parsed.user_info.name.as_deref(), Some("Sara"));
        assert_eq!(parsed.user_info.intent, Some(Intent::Booking));
        assert_eq!(parsed.lead_score, 70.0);
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut payload = full_payload();
        payload["userInfo"].as_object_mut().unwrap().remove("email");
        assert!(ModelExtraction::parse(&payload.to_string()).is_err());
    }

    #[test]
    fn unknown_intent_is_rejected() {
        let mut payload = full_payload();
        payload["userInfo"]["intent"] = json!("complaint");
        assert!(ModelExtraction::parse(&payload.to_string()).is_err());
    }

    #[test]
    fn extra_keys_are_rejected() {
        let mut payload = full_payload();
        payload["mood"] = json!("happy");
        assert!(ModelExtraction::parse(&payload.to_string()).is_err());
    }

    #[test]
    fn code_fences_are_tolerated() {
        let fenced = format!("```json\n{}\n```", full_payload());
        assert!(ModelExtraction::parse(&fenced).is_ok());
    }

    #[test]
    fn prose_is_rejected() {
        assert!(ModelExtraction::parse("The customer is Sara.").is_err());
    }

    #[test]
    fn support_intent_has_no_lead_type() {
        assert_eq!(Intent::Support.lead_type(), None);
        assert_eq!(Intent::Order.lead_type(), Some(LeadType::Order));
    }
}
