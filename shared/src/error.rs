//! Shared error types

use thiserror::Error;

/// Snapshot decoding / shape validation failure
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Row does not deserialize into an order
    #[error("Malformed order row: {0}")]
    Decode(#[from] serde_json::Error),

    /// Row decodes but a field is unusable
    #[error("Invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl SnapshotError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
