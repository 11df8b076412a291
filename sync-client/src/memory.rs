//! In-memory order store and change feed
//!
//! Stand-ins for the hosted store, used by tests and the demo. Every write
//! bumps `updated_at` and publishes the new row to the attached feed, the way
//! the hosted store's replication stream does. Failure injection covers the
//! recovery paths: failed reads, refused subscriptions, dropped connections
//! and silently lost events.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use shared::order::{
    ChangeEvent, ItemStatus, Order, OrderStatus, PaymentStatus, SubscriptionKey,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::store::{ChangeFeed, FeedSignal, FeedSink, OrderStore, Row, Subscription};

// ============================================================================
// Change Feed
// ============================================================================

struct FeedInner {
    subscribers: DashMap<Uuid, (SubscriptionKey, FeedSink)>,
    /// subscribe() fails while false
    available: AtomicBool,
    /// publish() silently loses events while true
    dropping: AtomicBool,
    /// subscribe() calls, refused ones included
    attempts: AtomicU64,
}

/// Broadcast-style change feed with per-key filtering
#[derive(Clone)]
pub struct InMemoryChangeFeed {
    inner: Arc<FeedInner>,
}

impl Default for InMemoryChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChangeFeed {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FeedInner {
                subscribers: DashMap::new(),
                available: AtomicBool::new(true),
                dropping: AtomicBool::new(false),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Deliver an event to every matching subscriber; returns the delivery count
    pub fn publish(&self, event: ChangeEvent) -> usize {
        if self.inner.dropping.load(Ordering::SeqCst) {
            tracing::trace!("Change feed dropping event");
            return 0;
        }

        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.inner.subscribers.iter() {
            let (key, sink) = entry.value();
            if !key.matches_row(&event.row) {
                continue;
            }
            if sink.send(FeedSignal::Event(event.clone())).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }
        for id in closed {
            self.inner.subscribers.remove(&id);
        }
        delivered
    }

    /// Refuse (or accept again) new subscriptions
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Silently lose (or deliver again) published events
    pub fn set_dropping(&self, dropping: bool) {
        self.inner.dropping.store(dropping, Ordering::SeqCst);
    }

    /// Fail every live subscription with `onError`
    pub fn disconnect_all(&self, reason: &str) {
        for entry in self.inner.subscribers.iter() {
            let _ = entry.value().1.send(FeedSignal::Error(reason.to_string()));
        }
        self.inner.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    pub fn subscribe_attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeFeed for InMemoryChangeFeed {
    async fn subscribe(&self, key: &SubscriptionKey, sink: FeedSink) -> SyncResult<Subscription> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(SyncError::PushChannelUnavailable(
                "realtime connection refused".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        self.inner.subscribers.insert(id, (key.clone(), sink));
        tracing::debug!(subscription = %id, key = %key, "Change feed subscriber added");

        let inner = Arc::downgrade(&self.inner);
        Ok(Subscription::with_id(id, move || {
            if let Some(inner) = inner.upgrade() {
                inner.subscribers.remove(&id);
            }
        }))
    }
}

// ============================================================================
// Order Store
// ============================================================================

struct StoreInner {
    orders: DashMap<String, Order>,
    feed: Option<InMemoryChangeFeed>,
    fail_reads: AtomicU32,
    /// Only get_order() consumes these
    fail_point_reads: AtomicU32,
    fail_writes: AtomicU32,
    reads: AtomicU64,
}

/// Order rows keyed by id
#[derive(Clone)]
pub struct InMemoryOrderStore {
    inner: Arc<StoreInner>,
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOrderStore {
    /// Store without replication
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Store publishing every write to `feed`
    pub fn with_feed(feed: InMemoryChangeFeed) -> Self {
        Self::build(Some(feed))
    }

    fn build(feed: Option<InMemoryChangeFeed>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                orders: DashMap::new(),
                feed,
                fail_reads: AtomicU32::new(0),
                fail_point_reads: AtomicU32::new(0),
                fail_writes: AtomicU32::new(0),
                reads: AtomicU64::new(0),
            }),
        }
    }

    /// Order placement (external flow)
    pub fn insert(&self, order: Order) {
        self.inner.orders.insert(order.id.clone(), order.clone());
        self.publish(ChangeEvent::insert(to_row(&order)));
    }

    /// Payment webhook write
    pub fn set_payment_status(&self, order_id: &str, status: PaymentStatus) -> SyncResult<Order> {
        self.write(order_id, |order| {
            order.payment_status = status;
            Ok(())
        })
    }

    /// Current row, decoded
    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.inner.orders.get(order_id).map(|o| o.value().clone())
    }

    /// Fail the next `n` reads
    pub fn fail_next_reads(&self, n: u32) {
        self.inner.fail_reads.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` point reads, range reads keep working
    pub fn fail_next_point_reads(&self, n: u32) {
        self.inner.fail_point_reads.store(n, Ordering::SeqCst);
    }

    /// Overwrite a row verbatim: no `updated_at` bump, nothing published
    ///
    /// Simulates a lagging replica serving an old or conflicting row.
    pub fn put_raw(&self, order: Order) {
        self.inner.orders.insert(order.id.clone(), order);
    }

    /// Fail the next `n` writes
    pub fn fail_next_writes(&self, n: u32) {
        self.inner.fail_writes.store(n, Ordering::SeqCst);
    }

    /// Number of read calls served (including failed ones)
    pub fn read_count(&self) -> u64 {
        self.inner.reads.load(Ordering::SeqCst)
    }

    fn begin_read(&self) -> SyncResult<()> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.inner.fail_reads) {
            return Err(SyncError::Store("injected read failure".to_string()));
        }
        Ok(())
    }

    fn write(
        &self,
        order_id: &str,
        apply: impl FnOnce(&mut Order) -> SyncResult<()>,
    ) -> SyncResult<Order> {
        if take_one(&self.inner.fail_writes) {
            return Err(SyncError::Store("injected write failure".to_string()));
        }

        let updated = {
            let mut order = self
                .inner
                .orders
                .get_mut(order_id)
                .ok_or_else(|| SyncError::OrderNotFound(order_id.to_string()))?;
            apply(order.value_mut())?;
            touch(order.value_mut());
            order.value().clone()
        };

        self.publish(ChangeEvent::update(to_row(&updated)));
        Ok(updated)
    }

    fn publish(&self, event: ChangeEvent) {
        if let Some(feed) = &self.inner.feed {
            feed.publish(event);
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get_order(&self, order_id: &str) -> SyncResult<Option<Row>> {
        self.begin_read()?;
        if take_one(&self.inner.fail_point_reads) {
            return Err(SyncError::Store(format!("injected read failure for {}", order_id)));
        }
        Ok(self.inner.orders.get(order_id).map(|o| to_row(o.value())))
    }

    async fn list_orders(&self, tenant_id: &str, statuses: &[OrderStatus]) -> SyncResult<Vec<Row>> {
        self.begin_read()?;
        let mut orders: Vec<Order> = self
            .inner
            .orders
            .iter()
            .filter(|o| o.tenant_id == tenant_id && statuses.contains(&o.order_status))
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders.iter().map(to_row).collect())
    }

    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> SyncResult<Row> {
        let order = self.write(order_id, |order| {
            order.order_status = status;
            Ok(())
        })?;
        Ok(to_row(&order))
    }

    async fn update_item_status(
        &self,
        order_id: &str,
        index: usize,
        status: ItemStatus,
    ) -> SyncResult<Row> {
        let order = self.write(order_id, |order| {
            let item = order
                .items
                .get_mut(index)
                .ok_or_else(|| SyncError::ItemNotFound {
                    order_id: order_id.to_string(),
                    index,
                })?;
            item.item_status = status;
            Ok(())
        })?;
        Ok(to_row(&order))
    }
}

/// Keep `updated_at` strictly increasing per row
fn touch(order: &mut Order) {
    let now = Utc::now();
    order.updated_at = if now > order.updated_at {
        now
    } else {
        order.updated_at + chrono::Duration::milliseconds(1)
    };
}

fn to_row(order: &Order) -> Row {
    serde_json::to_value(order).unwrap_or(serde_json::Value::Null)
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_order;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_writes_bump_updated_at_and_publish() {
        let feed = InMemoryChangeFeed::new();
        let store = InMemoryOrderStore::with_feed(feed.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = feed.subscribe(&SubscriptionKey::order("o1"), tx).await.unwrap();

        let order = sample_order("o1", OrderStatus::Received);
        let before = order.updated_at;
        store.insert(order);
        assert!(matches!(rx.recv().await, Some(FeedSignal::Event(e)) if e.kind == shared::ChangeKind::Insert));

        let row = store
            .update_order_status("o1", OrderStatus::Preparing)
            .await
            .unwrap();
        let updated = Order::from_row(row).unwrap();
        assert!(updated.updated_at > before);
        assert_eq!(updated.order_status, OrderStatus::Preparing);

        match rx.recv().await {
            Some(FeedSignal::Event(event)) => assert_eq!(event.row["order_status"], "preparing"),
            other => panic!("unexpected signal: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_feed_filters_by_key() {
        let feed = InMemoryChangeFeed::new();
        let store = InMemoryOrderStore::with_feed(feed.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = feed.subscribe(&SubscriptionKey::tenant("tenant-2"), tx).await.unwrap();

        store.insert(sample_order("o1", OrderStatus::Received));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscription_drop_removes_subscriber() {
        let feed = InMemoryChangeFeed::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let sub = feed.subscribe(&SubscriptionKey::tenant("tenant-1"), tx).await.unwrap();
        assert_eq!(feed.subscriber_count(), 1);
        drop(sub);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let feed = InMemoryChangeFeed::new();
        feed.set_available(false);
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = feed
            .subscribe(&SubscriptionKey::order("o1"), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PushChannelUnavailable(_)));

        let store = InMemoryOrderStore::new();
        store.insert(sample_order("o1", OrderStatus::Received));
        store.fail_next_reads(1);
        assert!(store.get_order("o1").await.is_err());
        assert!(store.get_order("o1").await.unwrap().is_some());
        assert_eq!(store.read_count(), 2);

        let err = store
            .update_item_status("o1", 9, ItemStatus::Served)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ItemNotFound { index: 9, .. }));
    }

    #[tokio::test]
    async fn test_list_orders_filters_active() {
        let store = InMemoryOrderStore::new();
        store.insert(sample_order("o1", OrderStatus::Received));
        store.insert(sample_order("o2", OrderStatus::Served));
        let rows = store
            .list_orders("tenant-1", &OrderStatus::ACTIVE)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "o1");
    }
}
