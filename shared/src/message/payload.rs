use crate::order::{OrderStatus, PaymentStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==================== Notification Kind ====================

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// 普通信息
    Info,
    /// 成功
    Success,
    /// 警告
    Warning,
    /// 错误
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ==================== Notification ====================

/// Outbound notification (`notify(message, kind, durationMs)`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Order this notification is about
    pub order_id: String,
    pub message: String,
    pub kind: NotificationKind,
    pub duration_ms: u64,
}

impl Notification {
    pub fn new(
        order_id: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
        duration_ms: u64,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            message: message.into(),
            kind,
            duration_ms,
        }
    }

    /// "Order status updated: Preparing"
    pub fn order_status(order_id: impl Into<String>, status: OrderStatus, duration_ms: u64) -> Self {
        let kind = match status {
            OrderStatus::Cancelled => NotificationKind::Warning,
            OrderStatus::Ready | OrderStatus::Served | OrderStatus::Completed => {
                NotificationKind::Success
            }
            _ => NotificationKind::Info,
        };
        Self::new(
            order_id,
            format!("Order status updated: {}", status.label()),
            kind,
            duration_ms,
        )
    }

    /// "Payment confirmed" and friends
    pub fn payment_status(
        order_id: impl Into<String>,
        status: PaymentStatus,
        duration_ms: u64,
    ) -> Self {
        let kind = match status {
            PaymentStatus::Paid => NotificationKind::Success,
            PaymentStatus::Failed => NotificationKind::Error,
            PaymentStatus::Refunded => NotificationKind::Warning,
            PaymentStatus::Pending => NotificationKind::Info,
        };
        Self::new(order_id, status.label(), kind, duration_ms)
    }
}
