//! Partial lead update produced by extraction.

use serde::{Deserialize, Serialize};

use super::LeadType;

/// Fields to merge into a lead. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadPatch {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub lead_type: Option<LeadType>,
    /// Block appended to the existing free-text details.
    pub details_append: Option<String>,
    pub promote_to_contacted: bool,
}

impl LeadPatch {
    /// True when the patch carries no meaningful field; stores skip the write.
    pub fn is_empty(&self) -> bool {
        fn blank(value: &Option<String>) -> bool {
            value.as_deref().map_or(true, |v| v.trim().is_empty())
        }

        blank(&self.customer_name)
            && blank(&self.customer_phone)
            && self.lead_type.is_none()
            && blank(&self.details_append)
            && !self.promote_to_contacted
    }
}
