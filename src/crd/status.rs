//! # SopsSecret Status

use serde::{Deserialize, Serialize};

/// Status of the SopsSecret resource
///
/// Carries a single human readable message. The controller only ever writes one of
/// the values of [`crate::controller::reconciler::SopsSecretStatusMessage`].
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SopsSecretStatus {
    /// Outcome of the last reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
