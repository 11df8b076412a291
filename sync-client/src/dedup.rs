//! Notification deduplicator
//!
//! Push and poll routinely report the same transition twice, seconds apart.
//! Each order keeps one "last notified" value; the compare-and-set happens
//! under the map entry lock, before the notification is handed out, so two
//! near-simultaneous observations can never both win.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::Notification;
use shared::order::{OrderStatus, PaymentStatus};

/// Result of a single observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation<S> {
    /// First value seen for this order; becomes the baseline, never notified
    Baseline,
    /// Same as last notified
    Unchanged,
    /// Distinct change; last notified is now `to`
    Changed { from: S, to: S },
}

/// Per-order "last notified" tracker
#[derive(Debug)]
pub struct Deduplicator<S> {
    last: DashMap<String, S>,
}

impl<S> Default for Deduplicator<S>
where
    S: Copy + Eq,
{
    fn default() -> Self {
        Self {
            last: DashMap::new(),
        }
    }
}

impl<S> Deduplicator<S>
where
    S: Copy + Eq,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic compare-and-set for one order
    pub fn observe(&self, order_id: &str, status: S) -> Observation<S> {
        match self.last.entry(order_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(status);
                Observation::Baseline
            }
            Entry::Occupied(mut slot) => {
                let from = *slot.get();
                if from == status {
                    Observation::Unchanged
                } else {
                    slot.insert(status);
                    Observation::Changed { from, to: status }
                }
            }
        }
    }

    pub fn last(&self, order_id: &str) -> Option<S> {
        self.last.get(order_id).map(|s| *s)
    }

    /// Drop tracking for an order
    pub fn forget(&self, order_id: &str) {
        self.last.remove(order_id);
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

/// Order-status and payment-status deduplication producing notifications
#[derive(Debug)]
pub struct NotificationDeduplicator {
    order_status: Deduplicator<OrderStatus>,
    payment_status: Deduplicator<PaymentStatus>,
    duration_ms: u64,
}

impl NotificationDeduplicator {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            order_status: Deduplicator::new(),
            payment_status: Deduplicator::new(),
            duration_ms,
        }
    }

    /// `observe(order_id, newStatus)` - emits 0 or 1 notification
    pub fn observe(&self, order_id: &str, status: OrderStatus) -> Option<Notification> {
        match self.order_status.observe(order_id, status) {
            Observation::Changed { from, to } => {
                tracing::debug!(order_id = %order_id, from = %from, to = %to, "Order status change notified");
                Some(Notification::order_status(order_id, to, self.duration_ms))
            }
            Observation::Baseline | Observation::Unchanged => None,
        }
    }

    /// Same rule, applied to `payment_status`
    pub fn observe_payment(&self, order_id: &str, status: PaymentStatus) -> Option<Notification> {
        match self.payment_status.observe(order_id, status) {
            Observation::Changed { .. } => {
                Some(Notification::payment_status(order_id, status, self.duration_ms))
            }
            Observation::Baseline | Observation::Unchanged => None,
        }
    }

    pub fn last_notified(&self, order_id: &str) -> Option<OrderStatus> {
        self.order_status.last(order_id)
    }

    pub fn forget(&self, order_id: &str) {
        self.order_status.forget(order_id);
        self.payment_status.forget(order_id);
    }

    /// Orders with any remembered status
    pub fn tracked(&self) -> usize {
        self.order_status.len().max(self.payment_status.len())
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}
