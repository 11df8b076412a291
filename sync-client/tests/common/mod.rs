// sync-client/tests/common/mod.rs
// 集成测试公共工具

#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use shared::order::{Item, ItemStatus, Order, OrderStatus, PaymentMethod, PaymentStatus};
use std::sync::Arc;
use sync_client::{
    ChannelNavigator, ChannelNotifier, InMemoryChangeFeed, InMemoryOrderStore, Notification,
    SyncClient, SyncConfig,
};
use tokio::sync::mpsc;

/// Order placed `minutes` after the fixture epoch
pub fn order(id: &str, tenant_id: &str, status: OrderStatus, minutes: i64) -> Order {
    let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + ChronoDuration::minutes(minutes);
    let item = |menu_ref: &str, name: &str, price: f64| Item {
        menu_ref: menu_ref.to_string(),
        name: name.to_string(),
        unit_price: price,
        quantity: 1,
        item_status: ItemStatus::Queued,
        special_instructions: None,
    };
    Order {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        table_ref: Some("A3".to_string()),
        order_number: format!("#{}", id),
        order_token: format!("tok-{}", id),
        order_status: status,
        payment_status: PaymentStatus::Pending,
        payment_method: PaymentMethod::Cash,
        items: vec![
            item("m-101", "Paneer Tikka", 8.5),
            item("m-204", "Garlic Naan", 2.5),
            item("m-310", "Mango Lassi", 3.0),
        ],
        subtotal: 14.0,
        tax: 0.7,
        discount: 0.0,
        total: 14.7,
        created_at: created,
        updated_at: created,
    }
}

/// Store + feed + client wired with channel-backed outbound adapters
pub struct Harness {
    pub feed: InMemoryChangeFeed,
    pub store: InMemoryOrderStore,
    pub client: SyncClient,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
    pub redirects: mpsc::UnboundedReceiver<String>,
}

impl Harness {
    pub fn new(config: SyncConfig) -> Self {
        let feed = InMemoryChangeFeed::new();
        let store = InMemoryOrderStore::with_feed(feed.clone());
        let (notifier, notifications) = ChannelNotifier::new();
        let (navigator, redirects) = ChannelNavigator::new();
        let client = SyncClient::new(Arc::new(store.clone()), Arc::new(feed.clone()), config)
            .with_notifier(Arc::new(notifier))
            .with_navigator(Arc::new(navigator));
        Self {
            feed,
            store,
            client,
            notifications,
            redirects,
        }
    }

    /// Order-status notification messages received so far
    pub fn status_messages(&mut self) -> Vec<String> {
        drain(&mut self.notifications)
            .into_iter()
            .map(|n| n.message)
            .filter(|m| m.starts_with("Order status"))
            .collect()
    }
}

pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(value) = rx.try_recv() {
        out.push(value);
    }
    out
}

/// Let spawned tasks run without crossing a poll tick
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
}
