//! Status enums shared by every order viewer
//!
//! Values serialize as the store's column values (`snake_case`).

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Order Status
// ============================================================================

/// 订单状态
///
/// Forward sequence: `pending_payment → received → preparing → ready → served → completed`.
/// `cancelled` sits outside the sequence and is reachable from any pre-`served` state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// 等待支付
    #[default]
    PendingPayment,
    /// 已接单
    Received,
    /// 制作中
    Preparing,
    /// 待取餐
    Ready,
    /// 已上餐
    Served,
    /// 已取消
    Cancelled,
    /// 已完成
    Completed,
}

impl OrderStatus {
    /// Statuses a kitchen/manager dashboard still tracks
    pub const ACTIVE: [OrderStatus; 4] = [
        OrderStatus::PendingPayment,
        OrderStatus::Received,
        OrderStatus::Preparing,
        OrderStatus::Ready,
    ];

    /// Position in the forward sequence. `Cancelled` has no position.
    pub fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::PendingPayment => Some(0),
            OrderStatus::Received => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::Ready => Some(3),
            OrderStatus::Served => Some(4),
            OrderStatus::Completed => Some(5),
            OrderStatus::Cancelled => None,
        }
    }

    /// No viewer-facing progress happens after these
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Served | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    /// The order reached the table (order-level signal)
    pub fn is_served(self) -> bool {
        matches!(self, OrderStatus::Served | OrderStatus::Completed)
    }

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    /// Human-facing label used in notifications
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "Pending Payment",
            OrderStatus::Received => "Received",
            OrderStatus::Preparing => "Preparing",
            OrderStatus::Ready => "Ready",
            OrderStatus::Served => "Served",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Completed => "Completed",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Received => "received",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Served => "served",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Item Status
// ============================================================================

/// 菜品制作状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Queued,
    Preparing,
    Ready,
    Served,
}

impl ItemStatus {
    pub fn rank(self) -> u8 {
        match self {
            ItemStatus::Queued => 0,
            ItemStatus::Preparing => 1,
            ItemStatus::Ready => 2,
            ItemStatus::Served => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemStatus::Queued => "Queued",
            ItemStatus::Preparing => "Preparing",
            ItemStatus::Ready => "Ready",
            ItemStatus::Served => "Served",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Queued => write!(f, "queued"),
            ItemStatus::Preparing => write!(f, "preparing"),
            ItemStatus::Ready => write!(f, "ready"),
            ItemStatus::Served => write!(f, "served"),
        }
    }
}

// ============================================================================
// Payment
// ============================================================================

/// 支付状态 (由支付回调写入，本引擎只读)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Payment pending",
            PaymentStatus::Paid => "Payment confirmed",
            PaymentStatus::Failed => "Payment failed",
            PaymentStatus::Refunded => "Payment refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

/// 支付方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// 现金 - 允许先出餐后结算
    #[default]
    Cash,
    /// 在线支付
    Online,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Online => write!(f, "online"),
        }
    }
}
