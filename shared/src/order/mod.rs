//! Order lifecycle module
//!
//! - Types: status enums as stored in the order row
//! - Snapshot: the order row with embedded line items
//! - Transition: the order / item state machine
//! - Event: change feed envelope and subscription keys

pub mod event;
pub mod snapshot;
pub mod transition;
pub mod types;

// Re-exports
pub use event::{ChangeEvent, ChangeKind, SubscriptionKey};
pub use snapshot::{Item, MONEY_TOLERANCE, Order};
pub use transition::{
    TransitionOutcome, TransitionRejection, payment_gate_passes, validate_item_transition,
    validate_transition,
};
pub use types::*;
