//! Reconciler - merges snapshots from both channels into one local view
//!
//! Rule: the snapshot with the later `updated_at` replaces the local one as a
//! whole; an equal `updated_at` is the same row and is ignored. There is no
//! field-level merge since both channels read the same row.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::order::{Order, OrderStatus};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of comparing an incoming snapshot with the local one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No local snapshot yet
    Insert,
    /// Incoming is newer
    Replace,
    /// Same `updated_at` as local
    Duplicate,
    /// Older than local
    Stale,
}

impl Decision {
    pub fn is_accepted(self) -> bool {
        matches!(self, Decision::Insert | Decision::Replace)
    }
}

/// Last-write-wins by `updated_at`
pub fn reconcile(local: Option<&Order>, incoming: &Order) -> Decision {
    let Some(local) = local else {
        return Decision::Insert;
    };
    match incoming.updated_at.cmp(&local.updated_at) {
        Ordering::Greater => Decision::Replace,
        Ordering::Equal => Decision::Duplicate,
        Ordering::Less => Decision::Stale,
    }
}

/// Result of [`SnapshotTable::merge`]
#[derive(Debug, Clone, PartialEq)]
pub enum Merge {
    /// First snapshot seen for this order
    Inserted,
    /// Replaced; carries the previous snapshot
    Replaced(Box<Order>),
    /// Newer terminal row for an order already retired; the tombstone moved
    /// forward, the table is untouched
    Retired { previous: OrderStatus },
    Duplicate,
    Stale,
}

/// What is left of a retired order
#[derive(Debug, Clone, Copy)]
struct Tombstone {
    updated_at: DateTime<Utc>,
    status: OrderStatus,
    retired_at: Instant,
}

/// Default lifetime of a tombstone
pub const TOMBSTONE_TTL: Duration = Duration::from_secs(600);

/// Local snapshot table keyed by order id
///
/// Cloning shares the same table; the sync actor is the only writer.
/// Terminal orders can be [retired](Self::retire): the row is dropped and a
/// tombstone keeps late replays of it from coming back as new orders.
#[derive(Debug, Clone)]
pub struct SnapshotTable {
    orders: Arc<DashMap<String, Order>>,
    retired: Arc<DashMap<String, Tombstone>>,
    tombstone_ttl: Duration,
}

impl Default for SnapshotTable {
    fn default() -> Self {
        Self {
            orders: Arc::new(DashMap::new()),
            retired: Arc::new(DashMap::new()),
            tombstone_ttl: TOMBSTONE_TTL,
        }
    }
}

impl SnapshotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tombstone_ttl(mut self, ttl: Duration) -> Self {
        self.tombstone_ttl = ttl;
        self
    }

    /// Apply [`reconcile`] and replace atomically per order
    pub fn merge(&self, incoming: Order) -> Merge {
        let stone = self.retired.get(&incoming.id).map(|t| *t);
        if let Some(stone) = stone {
            match incoming.updated_at.cmp(&stone.updated_at) {
                Ordering::Less => return Merge::Stale,
                Ordering::Equal => return Merge::Duplicate,
                Ordering::Greater if !incoming.order_status.is_active() => {
                    if let Some(mut t) = self.retired.get_mut(&incoming.id) {
                        t.updated_at = incoming.updated_at;
                        t.status = incoming.order_status;
                    }
                    return Merge::Retired {
                        previous: stone.status,
                    };
                }
                // reopened by the store: tracked again from scratch
                Ordering::Greater => {
                    self.retired.remove(&incoming.id);
                }
            }
        }

        match self.orders.entry(incoming.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(incoming);
                Merge::Inserted
            }
            Entry::Occupied(mut slot) => match reconcile(Some(slot.get()), &incoming) {
                Decision::Insert | Decision::Replace => {
                    Merge::Replaced(Box::new(slot.insert(incoming)))
                }
                Decision::Duplicate => Merge::Duplicate,
                Decision::Stale => Merge::Stale,
            },
        }
    }

    /// Drop an order's row, leaving a tombstone; expired tombstones are pruned
    pub fn retire(&self, order_id: &str) -> bool {
        let Some((id, order)) = self.orders.remove(order_id) else {
            return false;
        };
        let now = Instant::now();
        let ttl = self.tombstone_ttl;
        self.retired
            .retain(|_, t| now.saturating_duration_since(t.retired_at) < ttl);
        self.retired.insert(
            id,
            Tombstone {
                updated_at: order.updated_at,
                status: order.order_status,
                retired_at: now,
            },
        );
        true
    }

    pub fn is_retired(&self, order_id: &str) -> bool {
        self.retired.contains_key(order_id)
    }

    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.get(order_id).map(|o| o.value().clone())
    }

    /// Non-terminal orders, oldest first (kitchen priority)
    pub fn active(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.order_status.is_active())
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        orders
    }

    /// Ids of locally non-terminal orders
    pub fn active_ids(&self) -> Vec<String> {
        self.orders
            .iter()
            .filter(|o| o.order_status.is_active())
            .map(|o| o.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn tombstones(&self) -> usize {
        self.retired.len()
    }
}
