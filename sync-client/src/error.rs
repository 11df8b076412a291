//! Sync engine error types
//!
//! Observation-path failures (`PushChannelUnavailable`, `PollReadFailure`,
//! `InvalidSnapshot`) are recovered inside the engine and only ever logged.
//! The remaining variants come back from user-initiated actions.

use shared::SnapshotError;
use shared::order::TransitionRejection;
use thiserror::Error;

/// Sync engine error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// Push subscription could not be established or was lost
    #[error("Push channel unavailable: {0}")]
    PushChannelUnavailable(String),

    /// A single poll cycle failed to read the store
    #[error("Poll read failed: {0}")]
    PollReadFailure(String),

    /// Snapshot failed decoding or shape validation
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(#[from] SnapshotError),

    /// State machine rejected a transition (includes `PaymentNotConfirmed`)
    #[error("Transition rejected: {0}")]
    Transition(#[from] TransitionRejection),

    /// Order is closed to further kitchen progress
    #[error("Order {0} is closed")]
    OrderClosed(String),

    /// Order not found
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Item index out of range
    #[error("Item {index} not found in order {order_id}")]
    ItemNotFound { order_id: String, index: usize },

    /// Store rejected or failed a request
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether this is a `PaymentNotConfirmed` rejection
    pub fn is_payment_not_confirmed(&self) -> bool {
        matches!(
            self,
            SyncError::Transition(TransitionRejection::PaymentNotConfirmed { .. })
        )
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
