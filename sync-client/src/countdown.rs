//! Countdown / redirect controller
//!
//! The first time an order shows the served condition (order-level
//! `served`/`completed`, or every item `served`) a single countdown starts;
//! on expiry exactly one redirect fires. Re-observing the served condition
//! never restarts it. Tearing the controller down cancels pending timers.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::order::Order;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::event::SyncEvent;
use crate::outbound::Navigator;

/// Per-order countdown state; an entry is the one-shot "already started" token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Running { deadline: Instant },
    /// Redirect fired
    Expired,
    /// Torn down before expiry
    Cancelled,
}

/// One-shot served countdown per order
pub struct CountdownController {
    duration: Duration,
    redirect_path: String,
    navigator: Arc<dyn Navigator>,
    started: Arc<DashMap<String, Slot>>,
    /// Drop an order's entry once its redirect fired
    release_on_expiry: bool,
    shutdown: CancellationToken,
    events: Option<broadcast::Sender<SyncEvent>>,
}

impl CountdownController {
    pub fn new(
        duration: Duration,
        redirect_path: impl Into<String>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            duration,
            redirect_path: redirect_path.into(),
            navigator,
            started: Arc::new(DashMap::new()),
            release_on_expiry: false,
            shutdown: CancellationToken::new(),
            events: None,
        }
    }

    /// Tie timers to an outer shutdown token
    pub fn with_shutdown(mut self, parent: &CancellationToken) -> Self {
        self.shutdown = parent.child_token();
        self
    }

    /// Publish start/redirect into a sync event stream
    pub fn with_events(mut self, events: broadcast::Sender<SyncEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Forget an order after its redirect fired (long-lived dashboard sessions)
    ///
    /// The caller must make sure a released order is not observed again,
    /// otherwise its countdown would start a second time.
    pub fn with_release_on_expiry(mut self, release: bool) -> Self {
        self.release_on_expiry = release;
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Evaluate the served condition; returns `true` if a countdown started now
    pub fn observe(&self, order: &Order) -> bool {
        if !order.is_served() || self.shutdown.is_cancelled() {
            return false;
        }

        let deadline = Instant::now() + self.duration;
        match self.started.entry(order.id.clone()) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(slot) => {
                slot.insert(Slot::Running { deadline });
            }
        }

        tracing::info!(
            order_id = %order.id,
            seconds = self.duration.as_secs(),
            "Order served, countdown started"
        );
        if let Some(tx) = &self.events {
            let _ = tx.send(SyncEvent::CountdownStarted {
                order_id: order.id.clone(),
                duration: self.duration,
            });
        }

        let order_id = order.id.clone();
        let path = self.redirect_path.clone();
        let navigator = self.navigator.clone();
        let events = self.events.clone();
        let started = self.started.clone();
        let release = self.release_on_expiry;
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(order_id = %order_id, "Countdown cancelled before expiry");
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::info!(order_id = %order_id, path = %path, "Countdown expired, redirecting");
                    navigator.navigate(&path);
                    if release {
                        started.remove(&order_id);
                    } else {
                        started.insert(order_id.clone(), Slot::Expired);
                    }
                    if let Some(tx) = events {
                        let _ = tx.send(SyncEvent::Redirected { order_id, path });
                    }
                }
            }
        });

        true
    }

    pub fn is_started(&self, order_id: &str) -> bool {
        self.started.contains_key(order_id)
    }

    /// Time left on a countdown
    ///
    /// `Some(ZERO)` once the redirect fired (or is due), `None` when no
    /// countdown exists for the order or it was torn down before expiry.
    pub fn remaining(&self, order_id: &str) -> Option<Duration> {
        match *self.started.get(order_id)? {
            Slot::Running { deadline } => {
                let left = deadline.saturating_duration_since(Instant::now());
                if self.shutdown.is_cancelled() && !left.is_zero() {
                    None
                } else {
                    Some(left)
                }
            }
            Slot::Expired => Some(Duration::ZERO),
            Slot::Cancelled => None,
        }
    }

    /// Orders currently holding a countdown entry
    pub fn len(&self) -> usize {
        self.started.len()
    }

    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }

    /// Cancel every pending timer; later observations are ignored
    pub fn teardown(&self) {
        self.shutdown.cancel();
        let now = Instant::now();
        for mut slot in self.started.iter_mut() {
            if let Slot::Running { deadline } = *slot
                && deadline > now
            {
                *slot = Slot::Cancelled;
            }
        }
    }
}

impl Drop for CountdownController {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
