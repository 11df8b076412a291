//! Staff-initiated status changes
//!
//! Every action reads the authoritative row first, validates against the
//! state machine, then issues a single targeted write. The engine never
//! patches its local snapshot from the write result; the new row arrives
//! back through the sync channels like any other change.

use shared::order::{
    ItemStatus, Order, OrderStatus, validate_item_transition, validate_transition,
};
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::store::OrderStore;

/// Kitchen/staff write path
#[derive(Clone)]
pub struct StatusUpdater {
    store: Arc<dyn OrderStore>,
}

impl StatusUpdater {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Move an order to `next`
    ///
    /// Returns the stored row after the write, or the current row unchanged
    /// when `next` equals the stored status (no write issued).
    pub async fn advance_order(&self, order_id: &str, next: OrderStatus) -> SyncResult<Order> {
        let current = self.load(order_id).await?;

        let outcome = validate_transition(
            current.order_status,
            next,
            current.payment_status,
            current.payment_method,
        )
        .inspect_err(|rejection| {
            tracing::warn!(
                order_id = %order_id,
                from = %current.order_status,
                to = %next,
                error = %rejection,
                "Order transition rejected"
            );
        })?;

        if !outcome.is_change() {
            tracing::debug!(order_id = %order_id, status = %next, "Order already in target status");
            return Ok(current);
        }

        let row = self.store.update_order_status(order_id, next).await?;
        let updated = Order::from_row(row)?;
        tracing::info!(
            order_id = %order_id,
            from = %current.order_status,
            to = %updated.order_status,
            "Order status written"
        );
        Ok(updated)
    }

    /// Move one line item to `next`
    pub async fn advance_item(
        &self,
        order_id: &str,
        index: usize,
        next: ItemStatus,
    ) -> SyncResult<Order> {
        let current = self.load(order_id).await?;

        // served 订单仍允许补录菜品状态
        if matches!(
            current.order_status,
            OrderStatus::Cancelled | OrderStatus::Completed
        ) {
            return Err(SyncError::OrderClosed(order_id.to_string()));
        }

        let item = current
            .items
            .get(index)
            .ok_or_else(|| SyncError::ItemNotFound {
                order_id: order_id.to_string(),
                index,
            })?;

        let outcome = validate_item_transition(item.item_status, next)?;
        if !outcome.is_change() {
            return Ok(current);
        }

        let row = self.store.update_item_status(order_id, index, next).await?;
        let updated = Order::from_row(row)?;
        tracing::info!(
            order_id = %order_id,
            item = index,
            name = %item.name,
            to = %next,
            "Item status written"
        );
        Ok(updated)
    }

    /// Cancel an order that has not been served yet
    pub async fn cancel(&self, order_id: &str) -> SyncResult<Order> {
        self.advance_order(order_id, OrderStatus::Cancelled).await
    }

    async fn load(&self, order_id: &str) -> SyncResult<Order> {
        let row = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| SyncError::OrderNotFound(order_id.to_string()))?;
        Ok(Order::from_row(row)?)
    }
}
