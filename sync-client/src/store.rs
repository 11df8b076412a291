//! External collaborator contracts
//!
//! The order store and the change feed are owned by the hosting platform.
//! Rows cross these seams undecoded (`serde_json::Value`) so the engine can
//! shape-check every snapshot regardless of which channel delivered it.

use async_trait::async_trait;
use shared::order::{ChangeEvent, ItemStatus, OrderStatus, SubscriptionKey};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::SyncResult;

/// Raw order row as returned by the store
pub type Row = serde_json::Value;

/// Order store read/write contract
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Point read by order id
    async fn get_order(&self, order_id: &str) -> SyncResult<Option<Row>>;

    /// Range read of a tenant's orders in `statuses`, ordered by `created_at`
    async fn list_orders(&self, tenant_id: &str, statuses: &[OrderStatus]) -> SyncResult<Vec<Row>>;

    /// Targeted `order_status` update; bumps `updated_at` and returns the new row
    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> SyncResult<Row>;

    /// Targeted update of one item's `item_status`; bumps `updated_at`
    async fn update_item_status(
        &self,
        order_id: &str,
        index: usize,
        status: ItemStatus,
    ) -> SyncResult<Row>;
}

/// Signal delivered to a subscriber
#[derive(Debug, Clone)]
pub enum FeedSignal {
    /// `onEvent`
    Event(ChangeEvent),
    /// `onError` - the connection is gone
    Error(String),
}

/// Sender half handed to [`ChangeFeed::subscribe`]
pub type FeedSink = mpsc::UnboundedSender<FeedSignal>;

/// Change feed subscribe contract
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Start delivering row changes matching `key` into `sink`
    ///
    /// Failing here means "push unavailable"; the caller keeps polling.
    async fn subscribe(&self, key: &SubscriptionKey, sink: FeedSink) -> SyncResult<Subscription>;
}

/// Live subscription; unsubscribes on drop
pub struct Subscription {
    id: Uuid,
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self::with_id(Uuid::new_v4(), unsubscribe)
    }

    /// Subscription whose id was allocated by the feed
    pub fn with_id(id: Uuid, unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Subscription without a teardown hook
    pub fn detached() -> Self {
        Self {
            id: Uuid::new_v4(),
            unsubscribe: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Explicit unsubscribe (same as dropping)
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
