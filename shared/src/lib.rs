//! Shared types for the order sync engine
//!
//! Data contract and pure logic used by every viewer: order rows, status
//! enums, the order state machine, change feed envelopes and outbound
//! notification payloads.

pub mod error;
pub mod message;
pub mod order;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::SnapshotError;
pub use message::{Notification, NotificationKind};
pub use order::{ChangeEvent, ChangeKind, Order, OrderStatus, SubscriptionKey};
