//! Sync Client - order status synchronization for viewer sessions
//!
//! Keeps a viewer's local copy of one order (customer tracking page) or of a
//! tenant's active orders (kitchen/manager dashboards) consistent with the
//! hosted order store, using two independent channels:
//!
//! - **push**: change-feed subscription, low latency, may silently drop
//! - **poll**: periodic full re-read, the self-healing fallback
//!
//! Snapshots from either channel go through one pipeline per session:
//! last-write-wins reconciliation on `updated_at`, state-machine diagnostics,
//! at-most-once status notifications, and the served → redirect countdown.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sync_client::{InMemoryChangeFeed, InMemoryOrderStore, SyncClient, SyncConfig};
//! use shared::order::SubscriptionKey;
//!
//! let feed = InMemoryChangeFeed::new();
//! let store = InMemoryOrderStore::with_feed(feed.clone());
//! let client = SyncClient::new(Arc::new(store), Arc::new(feed), SyncConfig::customer_tracking());
//!
//! let handle = client.attach(SubscriptionKey::order("order-1"));
//! let mut events = handle.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! handle.dispose().await;
//! ```

pub mod actions;
pub mod client;
pub mod config;
pub mod countdown;
pub mod dedup;
pub mod error;
pub mod event;
pub mod logger;
pub mod memory;
pub mod outbound;
pub mod reconcile;
pub mod store;

#[cfg(test)]
mod testing;

// Re-exports
pub use actions::StatusUpdater;
pub use client::{Channel, Retained, SyncClient, SyncHandle};
pub use config::SyncConfig;
pub use countdown::CountdownController;
pub use dedup::{Deduplicator, NotificationDeduplicator, Observation};
pub use error::{SyncError, SyncResult};
pub use event::SyncEvent;
pub use logger::{init_logger, init_logger_with_file};
pub use memory::{InMemoryChangeFeed, InMemoryOrderStore};
pub use outbound::{
    ChannelNavigator, ChannelNotifier, Navigator, NoopNavigator, Notifier, TracingNotifier,
};
pub use reconcile::{Decision, Merge, SnapshotTable, TOMBSTONE_TTL, reconcile};
pub use store::{ChangeFeed, FeedSignal, FeedSink, OrderStore, Row, Subscription};

// Re-export shared types for convenience
pub use shared::order::{Order, OrderStatus, SubscriptionKey};
pub use shared::{Notification, NotificationKind};
