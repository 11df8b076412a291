//! Outbound side effects: notifications and navigation
//!
//! Both are fire-and-forget and consumed by the presentation / routing layer
//! hosting the viewer.

use shared::Notification;
use tokio::sync::mpsc;

/// `notify(message, kind, durationMs)`
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// `navigate(path)`
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Writes notifications to the log (default when no UI is attached)
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        tracing::info!(
            order_id = %notification.order_id,
            kind = %notification.kind,
            duration_ms = notification.duration_ms,
            "{}",
            notification.message
        );
    }
}

/// Discards navigation requests
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, path: &str) {
        tracing::debug!(path = %path, "Navigation requested with no router attached");
    }
}

/// Forwards notifications into a channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // 接收端已关闭 (页面已卸载)，安全忽略
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }
}

/// Forwards navigation paths into a channel
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, path: &str) {
        if self.tx.send(path.to_string()).is_err() {
            tracing::debug!("Navigation receiver dropped");
        }
    }
}
