//! Lead entity and its enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    ConversationId, CustomerId, LeadId, TenantId, Timestamp, ValidationError,
};

use super::LeadPatch;

/// Name stored on a lead until extraction finds a real one.
pub const PLACEHOLDER_NAME: &str = "Unknown";

/// Kind of business opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeadType {
    Order,
    Booking,
    #[default]
    Inquiry,
}

impl LeadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadType::Order => "order",
            LeadType::Booking => "booking",
            LeadType::Inquiry => "inquiry",
        }
    }
}

impl fmt::Display for LeadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LeadType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(LeadType::Order),
            "booking" => Ok(LeadType::Booking),
            "inquiry" => Ok(LeadType::Inquiry),
            other => Err(ValidationError::unknown_variant("lead_type", other)),
        }
    }
}

/// Sales pipeline status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Converted,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Converted => "converted",
        }
    }

    /// Promotion to `Contacted` only ever moves a lead forward.
    pub fn promoted_to_contacted(self) -> Self {
        match self {
            LeadStatus::New => LeadStatus::Contacted,
            other => other,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(LeadStatus::New),
            "contacted" => Ok(LeadStatus::Contacted),
            "converted" => Ok(LeadStatus::Converted),
            other => Err(ValidationError::unknown_variant("lead_status", other)),
        }
    }
}

/// A business opportunity tied 1:1 to the conversation it was created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub tenant_id: TenantId,
    pub conversation_id: ConversationId,
    pub lead_type: LeadType,
    pub customer_name: String,
    pub customer_phone: String,
    pub details: String,
    pub status: LeadStatus,
    pub created_at: Timestamp,
}

impl Lead {
    /// Builds the lead created alongside a brand-new conversation.
    pub fn seed(
        tenant_id: TenantId,
        conversation_id: ConversationId,
        customer_id: &CustomerId,
        first_message: &str,
        now: Timestamp,
    ) -> Self {
        Self {
            id: LeadId::new(),
            tenant_id,
            conversation_id,
            lead_type: LeadType::Inquiry,
            customer_name: PLACEHOLDER_NAME.to_string(),
            customer_phone: customer_id.as_str().to_string(),
            details: first_message.trim().to_string(),
            status: LeadStatus::New,
            created_at: now,
        }
    }

    /// Applies a patch without ever replacing a populated field with an empty one.
    ///
    /// Returns true if anything changed.
    pub fn apply(&mut self, patch: &LeadPatch) -> bool {
        let before = self.clone();

        if let Some(name) = patch.customer_name.as_deref().filter(|n| !n.trim().is_empty()) {
            self.customer_name = name.trim().to_string();
        }
        if let Some(phone) = patch.customer_phone.as_deref().filter(|p| !p.trim().is_empty()) {
            self.customer_phone = phone.trim().to_string();
        }
        if let Some(lead_type) = patch.lead_type {
            self.lead_type = lead_type;
        }
        if let Some(block) = patch.details_append.as_deref().filter(|b| !b.trim().is_empty()) {
            self.details = append_details(&self.details, block);
        }
        if patch.promote_to_contacted {
            self.status = self.status.promoted_to_contacted();
        }

        *self != before
    }
}

/// Appends a details block, separated from existing content by a blank line.
pub fn append_details(existing: &str, block: &str) -> String {
    let block = block.trim();
    if existing.trim().is_empty() {
        block.to_string()
    } else {
        format!("{}\n\n{}", existing.trim_end(), block)
    }
}
