//! Query parameters for the extraction endpoints.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchQuery {
    /// Overrides the configured batch size for this pass.
    pub max: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractQuery {
    /// Bypass the completed-status gate.
    #[serde(default)]
    pub force: bool,
}
