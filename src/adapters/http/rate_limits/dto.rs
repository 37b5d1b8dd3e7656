//! DTOs for the rate limit administration endpoints.

use serde::{Deserialize, Serialize};

/// Result of a reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Counters removed.
    pub deleted: u64,
}
