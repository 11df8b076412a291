//! Sync client - one instance per viewer session
//!
//! ```text
//!  ChangeFeed ──(push)──┐
//!                       ├──► mpsc ──► actor: reconcile → validate → dedup → countdown
//!  OrderStore ──(poll)──┘                          │
//!                                                  ├──► Notifier / Navigator
//!                                                  └──► broadcast<SyncEvent>
//! ```
//!
//! Both channels run for the whole attachment and fail independently. The
//! actor is the single writer of the local snapshot table, so reconciliation
//! and notification dedup for one order never interleave.

use futures::FutureExt;
use shared::Notification;
use shared::order::{
    Order, OrderStatus, SubscriptionKey, validate_item_transition, validate_transition,
};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::countdown::CountdownController;
use crate::dedup::NotificationDeduplicator;
use crate::error::{SyncError, SyncResult};
use crate::event::SyncEvent;
use crate::outbound::{Navigator, NoopNavigator, Notifier, TracingNotifier};
use crate::reconcile::{Merge, SnapshotTable};
use crate::store::{ChangeFeed, FeedSignal, OrderStore};

/// Which channel delivered a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Push,
    Poll,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Push => write!(f, "push"),
            Channel::Poll => write!(f, "poll"),
        }
    }
}

/// Snapshot on its way to the actor
#[derive(Debug)]
struct Inbound {
    channel: Channel,
    order: Order,
}

// ============================================================================
// SyncClient
// ============================================================================

/// Sync client
///
/// Holds the collaborators; every [`attach`](Self::attach) starts an
/// independent session.
pub struct SyncClient {
    store: Arc<dyn OrderStore>,
    feed: Arc<dyn ChangeFeed>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    config: SyncConfig,
}

impl SyncClient {
    pub fn new(store: Arc<dyn OrderStore>, feed: Arc<dyn ChangeFeed>, config: SyncConfig) -> Self {
        Self {
            store,
            feed,
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(NoopNavigator),
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Start both channels for `key`
    ///
    /// Must be called from within a tokio runtime. Dropping or disposing the
    /// returned handle stops everything the session started.
    pub fn attach(&self, key: SubscriptionKey) -> SyncHandle {
        let shutdown = CancellationToken::new();
        let (events, _) = broadcast::channel(self.config.event_capacity.max(1));
        let table = SnapshotTable::new();

        // 看板会话长期运行: 终态订单处理完即释放
        let retire_terminal = matches!(key, SubscriptionKey::Tenant(_));

        let countdown = self.config.countdown.map(|duration| {
            Arc::new(
                CountdownController::new(
                    duration,
                    self.config.redirect_path.clone(),
                    self.navigator.clone(),
                )
                .with_shutdown(&shutdown)
                .with_events(events.clone())
                .with_release_on_expiry(retire_terminal),
            )
        });
        let dedup = Arc::new(NotificationDeduplicator::new(self.config.notification_ms()));

        let pipeline = Pipeline {
            key: key.clone(),
            table: table.clone(),
            dedup: dedup.clone(),
            notify_payment: self.config.notify_payment,
            retire_terminal,
            countdown: countdown.clone(),
            notifier: self.notifier.clone(),
            events: events.clone(),
            flagged_served: HashSet::new(),
            flagged_money: HashSet::new(),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let backoff = self.config.resubscribe.then(|| {
            let (initial, max) = self.config.effective_resubscribe_delay();
            Backoff { initial, max }
        });
        let poll_interval = self.config.effective_poll_interval();

        let tasks = vec![
            spawn_task("sync_actor", run_actor(pipeline, rx, shutdown.clone())),
            spawn_task(
                "push_channel",
                run_push(
                    self.feed.clone(),
                    key.clone(),
                    tx.clone(),
                    shutdown.clone(),
                    backoff,
                ),
            ),
            spawn_task(
                "poll_channel",
                run_poll(
                    self.store.clone(),
                    key.clone(),
                    table.clone(),
                    tx,
                    shutdown.clone(),
                    poll_interval,
                ),
            ),
        ];

        tracing::info!(
            key = %key,
            poll_ms = poll_interval.as_millis() as u64,
            "Sync session attached"
        );

        SyncHandle {
            key,
            table,
            dedup,
            countdown,
            events,
            shutdown,
            tasks,
        }
    }
}

// ============================================================================
// SyncHandle
// ============================================================================

/// Disposable handle of an attached session
pub struct SyncHandle {
    key: SubscriptionKey,
    table: SnapshotTable,
    dedup: Arc<NotificationDeduplicator>,
    countdown: Option<Arc<CountdownController>>,
    events: broadcast::Sender<SyncEvent>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Subscribe to the reconciled event stream
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Local snapshot of one order
    pub fn snapshot(&self, order_id: &str) -> Option<Order> {
        self.table.get(order_id)
    }

    /// The tracked order, for order-keyed sessions
    pub fn current(&self) -> Option<Order> {
        match &self.key {
            SubscriptionKey::Order(id) => self.table.get(id),
            SubscriptionKey::Tenant(_) => None,
        }
    }

    /// Non-terminal orders, oldest first
    pub fn active_orders(&self) -> Vec<Order> {
        self.table.active()
    }

    pub fn countdown_started(&self, order_id: &str) -> bool {
        self.countdown
            .as_ref()
            .is_some_and(|c| c.is_started(order_id))
    }

    pub fn countdown_remaining(&self, order_id: &str) -> Option<Duration> {
        self.countdown.as_ref().and_then(|c| c.remaining(order_id))
    }

    /// Per-order state the session currently holds
    pub fn retained(&self) -> Retained {
        Retained {
            snapshots: self.table.len(),
            tombstones: self.table.tombstones(),
            deduplicated: self.dedup.tracked(),
            countdowns: self.countdown.as_ref().map_or(0, |c| c.len()),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop both channels and any pending countdown, then wait for the tasks
    pub async fn dispose(mut self) {
        self.shutdown.cancel();
        if let Some(countdown) = &self.countdown {
            countdown.teardown();
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        tracing::info!(key = %self.key, "Sync session detached");
    }
}

/// Counts returned by [`SyncHandle::retained`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retained {
    pub snapshots: usize,
    pub tombstones: usize,
    pub deduplicated: usize,
    pub countdowns: usize,
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ============================================================================
// Actor
// ============================================================================

/// Everything that happens to an accepted snapshot
struct Pipeline {
    key: SubscriptionKey,
    table: SnapshotTable,
    dedup: Arc<NotificationDeduplicator>,
    notify_payment: bool,
    /// Drop terminal orders once processed (tenant sessions)
    retire_terminal: bool,
    countdown: Option<Arc<CountdownController>>,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<SyncEvent>,
    /// Orders whose served signals disagreed (logged once)
    flagged_served: HashSet<String>,
    /// Orders whose totals failed the money invariant (logged once)
    flagged_money: HashSet<String>,
}

impl Pipeline {
    fn ingest(&mut self, inbound: Inbound) {
        let Inbound { channel, order } = inbound;

        if !self.key.matches(&order) {
            tracing::debug!(order_id = %order.id, channel = %channel, "Snapshot outside subscription ignored");
            return;
        }

        let current = order.clone();
        match self.table.merge(order) {
            Merge::Duplicate => {
                tracing::debug!(order_id = %current.id, channel = %channel, "Duplicate snapshot ignored");
                return;
            }
            Merge::Stale => {
                tracing::debug!(
                    order_id = %current.id,
                    channel = %channel,
                    updated_at = %current.updated_at,
                    "Stale snapshot ignored"
                );
                return;
            }
            Merge::Inserted => {
                tracing::debug!(
                    order_id = %current.id,
                    channel = %channel,
                    status = %current.order_status,
                    "Baseline snapshot"
                );
            }
            Merge::Replaced(previous) => {
                tracing::debug!(
                    order_id = %current.id,
                    channel = %channel,
                    from = %previous.order_status,
                    to = %current.order_status,
                    "Snapshot replaced"
                );
                check_transitions(&previous, &current, channel);
            }
            Merge::Retired { previous } => {
                self.ingest_retired(previous, current, channel);
                return;
            }
        }

        self.diagnose(&current);

        let _ = self.events.send(SyncEvent::Updated(Box::new(current.clone())));

        if let Some(notification) = self.dedup.observe(&current.id, current.order_status) {
            self.deliver(notification);
        }
        if self.notify_payment
            && let Some(notification) = self.dedup.observe_payment(&current.id, current.payment_status)
        {
            self.deliver(notification);
        }

        if let Some(countdown) = &self.countdown {
            countdown.observe(&current);
        }

        if self.retire_terminal && !current.order_status.is_active() {
            self.retire(&current.id);
        }
    }

    /// Newer terminal row for an order already dropped from the session
    /// (e.g. `served → completed`); the deduplicator no longer remembers it,
    /// so the tombstone's status is the baseline.
    fn ingest_retired(&mut self, previous: OrderStatus, current: Order, channel: Channel) {
        tracing::debug!(
            order_id = %current.id,
            channel = %channel,
            from = %previous,
            to = %current.order_status,
            "Retired order advanced"
        );
        if let Err(rejection) = validate_transition(
            previous,
            current.order_status,
            current.payment_status,
            current.payment_method,
        ) {
            tracing::warn!(
                order_id = %current.id,
                channel = %channel,
                error = %rejection,
                "Store applied a transition the state machine rejects; keeping store value"
            );
        }

        let changed = previous != current.order_status;
        let notification = changed.then(|| {
            Notification::order_status(
                current.id.clone(),
                current.order_status,
                self.dedup.duration_ms(),
            )
        });
        let _ = self.events.send(SyncEvent::Updated(Box::new(current)));
        if let Some(notification) = notification {
            self.deliver(notification);
        }
    }

    /// Release everything the session holds for a terminal order
    fn retire(&mut self, order_id: &str) {
        if self.table.retire(order_id) {
            self.dedup.forget(order_id);
            self.flagged_served.remove(order_id);
            self.flagged_money.remove(order_id);
            tracing::debug!(order_id = %order_id, "Terminal order retired from session");
        }
    }

    /// Store-side inconsistencies are logged, never corrected
    fn diagnose(&mut self, order: &Order) {
        if order.served_signals_disagree() && self.flagged_served.insert(order.id.clone()) {
            tracing::warn!(
                order_id = %order.id,
                order_status = %order.order_status,
                served_items = order.served_count(),
                total_items = order.items.len(),
                "Order-level and item-level served signals disagree; treating either as served"
            );
        }
        if !order.money_invariant_holds() && self.flagged_money.insert(order.id.clone()) {
            tracing::warn!(
                order_id = %order.id,
                subtotal = order.subtotal,
                discount = order.discount,
                tax = order.tax,
                total = order.total,
                "Order total does not match subtotal - discount + tax"
            );
        }
    }

    fn deliver(&self, notification: Notification) {
        tracing::debug!(order_id = %notification.order_id, kind = %notification.kind, "Notification emitted");
        self.notifier.notify(notification.clone());
        let _ = self.events.send(SyncEvent::Notified(notification));
    }
}

/// Diagnostics only: the store is authoritative and may apply transitions
/// this engine does not know about (admin override).
fn check_transitions(previous: &Order, current: &Order, channel: Channel) {
    if let Err(rejection) = validate_transition(
        previous.order_status,
        current.order_status,
        current.payment_status,
        current.payment_method,
    ) {
        tracing::warn!(
            order_id = %current.id,
            channel = %channel,
            error = %rejection,
            "Store applied a transition the state machine rejects; keeping store value"
        );
    }

    for (index, (before, after)) in previous.items.iter().zip(&current.items).enumerate() {
        if let Err(rejection) = validate_item_transition(before.item_status, after.item_status) {
            tracing::warn!(
                order_id = %current.id,
                item = index,
                name = %after.name,
                error = %rejection,
                "Item status regressed in store; keeping store value"
            );
        }
    }
}

async fn run_actor(
    mut pipeline: Pipeline,
    mut rx: mpsc::UnboundedReceiver<Inbound>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            inbound = rx.recv() => match inbound {
                Some(inbound) => pipeline.ingest(inbound),
                None => break,
            },
        }
    }
    tracing::debug!(key = %pipeline.key, "Sync actor stopped");
}

// ============================================================================
// Channel A: push
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Backoff {
    initial: Duration,
    max: Duration,
}

enum PushExit {
    Shutdown,
    /// subscribe() failed
    Refused(SyncError),
    /// Subscription was live, then failed
    Lost(String),
}

async fn run_push(
    feed: Arc<dyn ChangeFeed>,
    key: SubscriptionKey,
    tx: mpsc::UnboundedSender<Inbound>,
    shutdown: CancellationToken,
    backoff: Option<Backoff>,
) {
    let mut delay = backoff.map(|b| b.initial).unwrap_or_default();

    loop {
        match listen(feed.as_ref(), &key, &tx, &shutdown).await {
            PushExit::Shutdown => return,
            PushExit::Refused(e) => {
                tracing::warn!(key = %key, error = %e, "Push channel unavailable, polling only");
            }
            PushExit::Lost(reason) => {
                tracing::warn!(key = %key, reason = %reason, "Push channel lost, polling only");
                if let Some(b) = backoff {
                    delay = b.initial;
                }
            }
        }

        let Some(b) = backoff else {
            return;
        };
        tracing::debug!(key = %key, delay_ms = delay.as_millis() as u64, "Push resubscribe scheduled");
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(b.max);
    }
}

/// One subscription lifetime
async fn listen(
    feed: &dyn ChangeFeed,
    key: &SubscriptionKey,
    tx: &mpsc::UnboundedSender<Inbound>,
    shutdown: &CancellationToken,
) -> PushExit {
    let (sink, mut signals) = mpsc::unbounded_channel();

    let subscription = tokio::select! {
        _ = shutdown.cancelled() => return PushExit::Shutdown,
        result = feed.subscribe(key, sink) => match result {
            Ok(subscription) => subscription,
            Err(e) => return PushExit::Refused(e),
        },
    };
    tracing::info!(key = %key, subscription = %subscription.id(), "Push channel subscribed");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return PushExit::Shutdown,
            signal = signals.recv() => match signal {
                Some(FeedSignal::Event(event)) => match Order::from_row(event.row) {
                    Ok(order) => {
                        if tx.send(Inbound { channel: Channel::Push, order }).is_err() {
                            return PushExit::Shutdown;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, channel = "push", error = %e, "Invalid snapshot dropped");
                    }
                },
                Some(FeedSignal::Error(reason)) => return PushExit::Lost(reason),
                None => return PushExit::Lost("change feed closed".to_string()),
            },
        }
    }
}

// ============================================================================
// Channel B: poll
// ============================================================================

async fn run_poll(
    store: Arc<dyn OrderStore>,
    key: SubscriptionKey,
    table: SnapshotTable,
    tx: mpsc::UnboundedSender<Inbound>,
    shutdown: CancellationToken,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = shutdown.cancelled() => return,
            result = poll_once(store.as_ref(), &key, &table) => result,
        };

        match result {
            Ok(orders) => {
                tracing::trace!(key = %key, count = orders.len(), "Poll cycle completed");
                for order in orders {
                    if tx.send(Inbound { channel: Channel::Poll, order }).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                // 保留旧快照，下个周期重试
                tracing::warn!(key = %key, error = %e, "Poll cycle failed, keeping last snapshot");
            }
        }
    }
}

/// One poll cycle: full re-read of the rows behind `key`
///
/// Tenant sessions also point-read orders that dropped out of the active
/// range since the last cycle, so their terminal row is still observed when
/// push is down.
async fn poll_once(
    store: &dyn OrderStore,
    key: &SubscriptionKey,
    table: &SnapshotTable,
) -> SyncResult<Vec<Order>> {
    let rows = match key {
        SubscriptionKey::Order(id) => store
            .get_order(id)
            .await
            .map_err(poll_failure)?
            .into_iter()
            .collect::<Vec<_>>(),
        SubscriptionKey::Tenant(tenant_id) => {
            let mut rows = store
                .list_orders(tenant_id, &OrderStatus::ACTIVE)
                .await
                .map_err(poll_failure)?;
            let listed: HashSet<String> = rows
                .iter()
                .filter_map(|row| row.get("id").and_then(|v| v.as_str()).map(str::to_string))
                .collect();
            for id in table.active_ids() {
                if listed.contains(&id) {
                    continue;
                }
                match store.get_order(&id).await {
                    Ok(Some(row)) => rows.push(row),
                    Ok(None) => {}
                    // 单个订单读取失败不影响本轮其它订单
                    Err(e) => tracing::warn!(
                        key = %key,
                        order_id = %id,
                        error = %poll_failure(e),
                        "Exit re-read failed, retrying next cycle"
                    ),
                }
            }
            rows
        }
    };

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        match Order::from_row(row) {
            Ok(order) => orders.push(order),
            Err(e) => {
                tracing::warn!(key = %key, channel = "poll", error = %e, "Invalid snapshot dropped");
            }
        }
    }
    Ok(orders)
}

fn poll_failure(e: SyncError) -> SyncError {
    match e {
        SyncError::PollReadFailure(_) => e,
        other => SyncError::PollReadFailure(other.to_string()),
    }
}

/// Spawn a session task, logging panics instead of losing them silently
fn spawn_task<F>(name: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(future).catch_unwind().await {
            let message = if let Some(s) = panic.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            tracing::error!(task = %name, panic = %message, "Sync task panicked");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryChangeFeed, InMemoryOrderStore};
    use crate::outbound::ChannelNotifier;
    use crate::testing::sample_order;
    use shared::order::ItemStatus;

    fn client(
        store: &InMemoryOrderStore,
        feed: &InMemoryChangeFeed,
        config: SyncConfig,
    ) -> (SyncClient, mpsc::UnboundedReceiver<Notification>) {
        let (notifier, rx) = ChannelNotifier::new();
        let client = SyncClient::new(Arc::new(store.clone()), Arc::new(feed.clone()), config)
            .with_notifier(Arc::new(notifier));
        (client, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_snapshot_is_silent() {
        let feed = InMemoryChangeFeed::new();
        let store = InMemoryOrderStore::with_feed(feed.clone());
        store.insert(sample_order("o1", OrderStatus::Preparing));

        let (client, mut rx) = client(&store, &feed, SyncConfig::customer_tracking());
        let handle = client.attach(SubscriptionKey::order("o1"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            handle.current().map(|o| o.order_status),
            Some(OrderStatus::Preparing)
        );
        assert!(drain(&mut rx).is_empty());
        handle.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_push_does_not_overwrite() {
        let feed = InMemoryChangeFeed::new();
        let store = InMemoryOrderStore::with_feed(feed.clone());
        let original = sample_order("o1", OrderStatus::Received);
        store.insert(original.clone());

        let (client, mut rx) = client(&store, &feed, SyncConfig::kitchen());
        let handle = client.attach(SubscriptionKey::tenant("tenant-1"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        store
            .update_order_status("o1", OrderStatus::Preparing)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // 旧行被重新投递
        feed.publish(shared::ChangeEvent::update(serde_json::to_value(&original).unwrap()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            handle.snapshot("o1").map(|o| o.order_status),
            Some(OrderStatus::Preparing)
        );
        assert_eq!(drain(&mut rx).len(), 1);
        handle.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_push_row_dropped() {
        let feed = InMemoryChangeFeed::new();
        let store = InMemoryOrderStore::with_feed(feed.clone());
        store.insert(sample_order("o1", OrderStatus::Received));

        let (client, mut rx) = client(&store, &feed, SyncConfig::customer_tracking());
        let handle = client.attach(SubscriptionKey::order("o1"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        feed.publish(shared::ChangeEvent::update(
            serde_json::json!({ "id": "o1", "order_status": "served" }),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            handle.current().map(|o| o.order_status),
            Some(OrderStatus::Received)
        );
        assert!(drain(&mut rx).is_empty());
        assert!(!handle.countdown_started("o1"));
        handle.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tenant_poll_picks_up_orders_leaving_active_set() {
        let feed = InMemoryChangeFeed::new();
        feed.set_available(false);
        let store = InMemoryOrderStore::with_feed(feed.clone());
        store.insert(sample_order("o1", OrderStatus::Ready));

        let config = SyncConfig::kitchen().with_resubscribe(false);
        let (client, mut rx) = client(&store, &feed, config);
        let handle = client.attach(SubscriptionKey::tenant("tenant-1"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.active_orders().len(), 1);

        store
            .update_order_status("o1", OrderStatus::Served)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(handle.active_orders().is_empty());
        // 终态订单已从看板会话释放
        assert!(handle.snapshot("o1").is_none());
        assert_eq!(handle.retained().tombstones, 1);
        let notes = drain(&mut rx);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "Order status updated: Served");
        handle.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_illegal_store_transition_still_accepted() {
        let feed = InMemoryChangeFeed::new();
        let store = InMemoryOrderStore::with_feed(feed.clone());
        let mut order = sample_order("o1", OrderStatus::Ready);
        order.items[0].item_status = ItemStatus::Ready;
        store.insert(order);

        let (client, mut rx) = client(&store, &feed, SyncConfig::manager());
        let handle = client.attach(SubscriptionKey::order("o1"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        // admin override: regression the state machine would reject
        store
            .update_order_status("o1", OrderStatus::Preparing)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            handle.current().map(|o| o.order_status),
            Some(OrderStatus::Preparing)
        );
        assert_eq!(drain(&mut rx).len(), 1);
        handle.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_unsubscribes_push() {
        let feed = InMemoryChangeFeed::new();
        let store = InMemoryOrderStore::with_feed(feed.clone());
        store.insert(sample_order("o1", OrderStatus::Received));

        let (client, _rx) = client(&store, &feed, SyncConfig::customer_tracking());
        let handle = client.attach(SubscriptionKey::order("o1"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(feed.subscriber_count(), 1);

        handle.dispose().await;
        assert_eq!(feed.subscriber_count(), 0);

        // 页面卸载后不再轮询
        let reads = store.read_count();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.read_count(), reads);
    }

    fn pipeline(key: SubscriptionKey) -> (Pipeline, mpsc::UnboundedReceiver<Notification>) {
        let (notifier, rx) = ChannelNotifier::new();
        let (events, _) = broadcast::channel(16);
        let pipeline = Pipeline {
            retire_terminal: matches!(key, SubscriptionKey::Tenant(_)),
            key,
            table: SnapshotTable::new(),
            dedup: Arc::new(NotificationDeduplicator::new(3000)),
            notify_payment: true,
            countdown: None,
            notifier: Arc::new(notifier),
            events,
            flagged_served: HashSet::new(),
            flagged_money: HashSet::new(),
        };
        (pipeline, rx)
    }

    fn poll(order: &Order) -> Inbound {
        Inbound {
            channel: Channel::Poll,
            order: order.clone(),
        }
    }

    #[tokio::test]
    async fn test_tenant_pipeline_releases_terminal_order() {
        let (mut pipeline, mut rx) = pipeline(SubscriptionKey::tenant("tenant-1"));

        let mut ready = sample_order("o1", OrderStatus::Ready);
        for item in &mut ready.items {
            item.item_status = ItemStatus::Served;
        }
        ready.total = 99.0;
        pipeline.ingest(poll(&ready));
        assert!(pipeline.flagged_served.contains("o1"));
        assert!(pipeline.flagged_money.contains("o1"));

        let mut completed = ready.clone();
        completed.order_status = OrderStatus::Completed;
        completed.updated_at = ready.updated_at + chrono::Duration::seconds(30);
        pipeline.ingest(poll(&completed));

        assert!(pipeline.table.is_empty());
        assert_eq!(pipeline.table.tombstones(), 1);
        assert_eq!(pipeline.dedup.tracked(), 0);
        assert!(pipeline.flagged_served.is_empty());
        assert!(pipeline.flagged_money.is_empty());
        assert_eq!(drain(&mut rx).len(), 1);

        // 迟到的旧快照不会作为新订单回到看板
        pipeline.ingest(poll(&ready));
        pipeline.ingest(poll(&completed));
        assert!(pipeline.table.is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_retired_order_reports_later_terminal_step() {
        let (mut pipeline, mut rx) = pipeline(SubscriptionKey::tenant("tenant-1"));
        let ready = sample_order("o1", OrderStatus::Ready);
        let mut served = ready.clone();
        served.order_status = OrderStatus::Served;
        served.updated_at = ready.updated_at + chrono::Duration::seconds(10);
        let mut completed = served.clone();
        completed.order_status = OrderStatus::Completed;
        completed.updated_at = served.updated_at + chrono::Duration::seconds(10);

        pipeline.ingest(poll(&ready));
        pipeline.ingest(poll(&served));
        pipeline.ingest(poll(&completed));
        pipeline.ingest(poll(&completed));

        let messages: Vec<String> = drain(&mut rx).into_iter().map(|n| n.message).collect();
        assert_eq!(
            messages,
            vec![
                "Order status updated: Served".to_string(),
                "Order status updated: Completed".to_string()
            ]
        );
        assert!(pipeline.table.is_empty());
    }

    #[tokio::test]
    async fn test_order_session_keeps_terminal_order() {
        let (mut pipeline, _rx) = pipeline(SubscriptionKey::order("o1"));
        pipeline.ingest(poll(&sample_order("o1", OrderStatus::Served)));
        assert_eq!(pipeline.table.len(), 1);
        assert_eq!(pipeline.table.tombstones(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_exit_read_keeps_rest_of_cycle() {
        let feed = InMemoryChangeFeed::new();
        feed.set_available(false);
        let store = InMemoryOrderStore::with_feed(feed.clone());
        store.insert(sample_order("o1", OrderStatus::Ready));
        let mut second = sample_order("o2", OrderStatus::Preparing);
        second.created_at = second.created_at + chrono::Duration::minutes(1);
        second.updated_at = second.created_at;
        store.insert(second);

        let config = SyncConfig::kitchen().with_resubscribe(false);
        let (client, mut rx) = client(&store, &feed, config);
        let handle = client.attach(SubscriptionKey::tenant("tenant-1"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        store.update_order_status("o1", OrderStatus::Served).await.unwrap();
        store.update_order_status("o2", OrderStatus::Ready).await.unwrap();
        store.fail_next_point_reads(1);
        tokio::time::sleep(Duration::from_secs(3)).await;

        // 范围读取的结果照常生效, o1 下一轮再读
        let messages: Vec<String> = drain(&mut rx).into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["Order status updated: Ready".to_string()]);
        assert_eq!(handle.active_orders().len(), 2);

        tokio::time::sleep(Duration::from_secs(3)).await;
        let messages: Vec<String> = drain(&mut rx).into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["Order status updated: Served".to_string()]);
        assert_eq!(handle.active_orders().len(), 1);
        handle.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_resubscribe_delay_does_not_spin() {
        let feed = InMemoryChangeFeed::new();
        feed.set_available(false);
        let store = InMemoryOrderStore::with_feed(feed.clone());
        store.insert(sample_order("o1", OrderStatus::Received));

        let mut config = SyncConfig::customer_tracking();
        config.resubscribe_delay = Duration::ZERO;
        config.max_resubscribe_delay = Duration::ZERO;
        let (client, _rx) = client(&store, &feed, config);
        let handle = client.attach(SubscriptionKey::order("o1"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        // 100ms 下限: 约 10 次, 而不是忙等
        let attempts = feed.subscribe_attempts();
        assert!(attempts >= 2 && attempts <= 12, "attempts = {}", attempts);
        handle.dispose().await;
    }
}
