//! Events published by an attached sync session
//!
//! Several widgets of one viewer (status card, payment banner, countdown
//! timer) subscribe to the same reconciled stream.

use shared::Notification;
use shared::order::Order;
use std::time::Duration;

/// Sync session event
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Local snapshot accepted (inserted or replaced)
    Updated(Box<Order>),
    /// A deduplicated notification was emitted
    Notified(Notification),
    /// Served countdown started
    CountdownStarted { order_id: String, duration: Duration },
    /// Countdown expired and the redirect fired
    Redirected { order_id: String, path: String },
}

impl SyncEvent {
    pub fn order_id(&self) -> &str {
        match self {
            SyncEvent::Updated(order) => &order.id,
            SyncEvent::Notified(n) => &n.order_id,
            SyncEvent::CountdownStarted { order_id, .. } => order_id,
            SyncEvent::Redirected { order_id, .. } => order_id,
        }
    }
}
