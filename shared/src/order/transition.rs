//! Order state machine
//!
//! Pure and synchronous. Every failure is returned as a [`TransitionRejection`].
//!
//! ```text
//! pending_payment → received → preparing → ready → served → completed
//!        │             │           │         │
//!        └─────────────┴───────────┴─────────┴──→ cancelled
//! ```
//!
//! Leaving `pending_payment` (other than to `cancelled`) requires the payment
//! gate: `payment_status = paid` or `payment_method = cash`.
//!
//! This is a consistency aid for viewers, not a security boundary. The real
//! gate check belongs to the order-placement / payment-webhook flow.

use super::types::{ItemStatus, OrderStatus, PaymentMethod, PaymentStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Accepted transition kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// `next == previous`; never a change for notification purposes
    Unchanged,
    /// Legal forward move (or cancellation)
    Advanced,
}

impl TransitionOutcome {
    pub fn is_change(self) -> bool {
        matches!(self, TransitionOutcome::Advanced)
    }
}

/// Why a transition was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TransitionRejection {
    #[error("Payment not confirmed ({method} order, payment {status})")]
    PaymentNotConfirmed {
        method: PaymentMethod,
        status: PaymentStatus,
    },

    #[error("Illegal order transition {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Illegal item transition {from} -> {to}")]
    IllegalItemTransition { from: ItemStatus, to: ItemStatus },
}

/// Cash orders may proceed pending in-person settlement
pub fn payment_gate_passes(status: PaymentStatus, method: PaymentMethod) -> bool {
    status == PaymentStatus::Paid || method == PaymentMethod::Cash
}

/// Validate an order-level transition
pub fn validate_transition(
    previous: OrderStatus,
    next: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
) -> Result<TransitionOutcome, TransitionRejection> {
    if previous == next {
        return Ok(TransitionOutcome::Unchanged);
    }

    let illegal = TransitionRejection::IllegalTransition {
        from: previous,
        to: next,
    };

    match previous {
        // 终态不可再变
        OrderStatus::Cancelled | OrderStatus::Completed => return Err(illegal),
        // served 只能归档为 completed
        OrderStatus::Served => {
            return if next == OrderStatus::Completed {
                Ok(TransitionOutcome::Advanced)
            } else {
                Err(illegal)
            };
        }
        _ => {}
    }

    if next == OrderStatus::Cancelled {
        return Ok(TransitionOutcome::Advanced);
    }

    let (Some(from), Some(to)) = (previous.rank(), next.rank()) else {
        return Err(illegal);
    };
    if to <= from {
        return Err(illegal);
    }

    if previous == OrderStatus::PendingPayment && !payment_gate_passes(payment_status, payment_method)
    {
        return Err(TransitionRejection::PaymentNotConfirmed {
            method: payment_method,
            status: payment_status,
        });
    }

    Ok(TransitionOutcome::Advanced)
}

/// Validate a single item's transition
///
/// Items progress independently; there is no cross-item ordering.
pub fn validate_item_transition(
    previous: ItemStatus,
    next: ItemStatus,
) -> Result<TransitionOutcome, TransitionRejection> {
    if previous == next {
        return Ok(TransitionOutcome::Unchanged);
    }
    if next.rank() > previous.rank() {
        Ok(TransitionOutcome::Advanced)
    } else {
        Err(TransitionRejection::IllegalItemTransition {
            from: previous,
            to: next,
        })
    }
}
