//! Order row snapshot
//!
//! One row per order with its line items embedded. Viewers never build these
//! themselves; every snapshot originates from the store (point read, range
//! read or change feed row) and is decoded with [`Order::from_row`].

use super::types::{ItemStatus, OrderStatus, PaymentMethod, PaymentStatus};
use crate::error::SnapshotError;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Line item - snapshot copy of the menu entry taken at order creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Menu catalog reference
    pub menu_ref: String,
    pub name: String,
    /// Price in currency unit
    pub unit_price: f64,
    pub quantity: i32,
    #[serde(default)]
    pub item_status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

/// Order row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    /// 所属餐厅
    pub tenant_id: String,
    /// 桌号 (外带订单为空)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_ref: Option<String>,
    pub order_number: String,
    pub order_token: String,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    /// Insertion order is kitchen priority order
    pub items: Vec<Item>,
    pub subtotal: f64,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub discount: f64,
    pub total: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Decode and shape-check a raw store row
    pub fn from_row(row: serde_json::Value) -> Result<Self, SnapshotError> {
        let order: Order = serde_json::from_value(row)?;
        order.validate_shape()?;
        Ok(order)
    }

    /// Basic shape validation
    ///
    /// Rejects rows no viewer could render. Business rules (transitions,
    /// totals) are diagnostics only and live elsewhere.
    pub fn validate_shape(&self) -> Result<(), SnapshotError> {
        if self.id.trim().is_empty() {
            return Err(SnapshotError::invalid("id", "must not be empty"));
        }
        if self.tenant_id.trim().is_empty() {
            return Err(SnapshotError::invalid("tenant_id", "must not be empty"));
        }
        if self.order_number.trim().is_empty() {
            return Err(SnapshotError::invalid("order_number", "must not be empty"));
        }
        if self.items.is_empty() {
            return Err(SnapshotError::invalid("items", "order has no line items"));
        }

        for (field, value) in [
            ("subtotal", self.subtotal),
            ("tax", self.tax),
            ("discount", self.discount),
            ("total", self.total),
        ] {
            require_amount(field, value)?;
        }

        for item in &self.items {
            require_amount("items.unit_price", item.unit_price)?;
            if item.quantity <= 0 {
                return Err(SnapshotError::invalid(
                    "items.quantity",
                    format!("must be positive, got {} for {}", item.quantity, item.name),
                ));
            }
        }

        if self.updated_at < self.created_at {
            return Err(SnapshotError::invalid(
                "updated_at",
                format!("{} precedes created_at {}", self.updated_at, self.created_at),
            ));
        }

        Ok(())
    }

    /// `total = subtotal - discount + tax`, within [`MONEY_TOLERANCE`]
    pub fn money_invariant_holds(&self) -> bool {
        let (Some(subtotal), Some(tax), Some(discount), Some(total)) = (
            Decimal::from_f64(self.subtotal),
            Decimal::from_f64(self.tax),
            Decimal::from_f64(self.discount),
            Decimal::from_f64(self.total),
        ) else {
            return false;
        };
        (subtotal - discount + tax - total).abs() < MONEY_TOLERANCE
    }

    /// Number of items already served
    pub fn served_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.item_status == ItemStatus::Served)
            .count()
    }

    /// Kitchen progress as a percentage (0-100)
    pub fn served_percent(&self) -> u8 {
        if self.items.is_empty() {
            return 0;
        }
        ((self.served_count() * 100) / self.items.len()) as u8
    }

    /// Derived signal: every line item reached `served`
    pub fn all_items_served(&self) -> bool {
        !self.items.is_empty() && self.served_count() == self.items.len()
    }

    /// Either served signal holds (order-level or item-level)
    pub fn is_served(&self) -> bool {
        self.order_status.is_served() || self.all_items_served()
    }

    /// Order-level and item-level served signals disagree
    ///
    /// Cancelled orders never count as a disagreement.
    pub fn served_signals_disagree(&self) -> bool {
        if self.order_status == OrderStatus::Cancelled {
            return false;
        }
        self.order_status.is_served() != self.all_items_served()
    }

    /// Dine-in orders carry a table reference
    pub fn is_takeaway(&self) -> bool {
        self.table_ref.is_none()
    }
}

fn require_amount(field: &'static str, value: f64) -> Result<(), SnapshotError> {
    if !value.is_finite() {
        return Err(SnapshotError::invalid(
            field,
            format!("must be a finite number, got {}", value),
        ));
    }
    if value < 0.0 {
        return Err(SnapshotError::invalid(
            field,
            format!("must be non-negative, got {}", value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_order() -> Order {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Order {
            id: "ord-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            table_ref: Some("T4".to_string()),
            order_number: "A-001".to_string(),
            order_token: "tok-1".to_string(),
            order_status: OrderStatus::Received,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Cash,
            items: vec![
                Item {
                    menu_ref: "menu-1".to_string(),
                    name: "Paneer Tikka".to_string(),
                    unit_price: 8.5,
                    quantity: 2,
                    item_status: ItemStatus::Queued,
                    special_instructions: None,
                },
                Item {
                    menu_ref: "menu-2".to_string(),
                    name: "Lassi".to_string(),
                    unit_price: 3.0,
                    quantity: 1,
                    item_status: ItemStatus::Queued,
                    special_instructions: Some("less sugar".to_string()),
                },
            ],
            subtotal: 20.0,
            tax: 1.0,
            discount: 2.0,
            total: 19.0,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_from_row_accepts_store_shape() {
        let row = serde_json::json!({
            "id": "ord-9",
            "tenant_id": "tenant-1",
            "table_ref": null,
            "order_number": "B-100",
            "order_token": "tok-9",
            "order_status": "pending_payment",
            "payment_status": "pending",
            "payment_method": "online",
            "items": [
                { "menu_ref": "m1", "name": "Dosa", "unit_price": 5.0, "quantity": 1, "item_status": "queued" }
            ],
            "subtotal": 5.0,
            "tax": 0.25,
            "discount": 0.0,
            "total": 5.25,
            "created_at": "2026-03-01T12:00:00Z",
            "updated_at": "2026-03-01T12:00:00Z"
        });

        let order = Order::from_row(row).unwrap();
        assert_eq!(order.order_status, OrderStatus::PendingPayment);
        assert_eq!(order.payment_method, PaymentMethod::Online);
        assert!(order.is_takeaway());
        assert!(order.money_invariant_holds());
    }

    #[test]
    fn test_from_row_rejects_garbage() {
        let err = Order::from_row(serde_json::json!({ "id": 42 })).unwrap_err();
        assert!(matches!(err, SnapshotError::Decode(_)));
    }

    #[test]
    fn test_validate_shape_rejects_bad_fields() {
        let mut order = sample_order();
        order.items.clear();
        assert!(order.validate_shape().is_err());

        let mut order = sample_order();
        order.total = f64::NAN;
        assert!(order.validate_shape().is_err());

        let mut order = sample_order();
        order.items[0].quantity = 0;
        assert!(order.validate_shape().is_err());

        let mut order = sample_order();
        order.updated_at = order.created_at - chrono::Duration::seconds(1);
        assert!(order.validate_shape().is_err());

        assert!(sample_order().validate_shape().is_ok());
    }

    #[test]
    fn test_money_invariant() {
        let mut order = sample_order();
        assert!(order.money_invariant_holds());

        order.total = 21.0;
        assert!(!order.money_invariant_holds());
    }

    #[test]
    fn test_served_signals() {
        let mut order = sample_order();
        assert!(!order.is_served());
        assert_eq!(order.served_percent(), 0);

        order.items[0].item_status = ItemStatus::Served;
        assert_eq!(order.served_percent(), 50);
        assert!(!order.all_items_served());

        order.items[1].item_status = ItemStatus::Served;
        assert!(order.all_items_served());
        assert!(order.is_served());
        // order_status still `received`
        assert!(order.served_signals_disagree());

        order.order_status = OrderStatus::Served;
        assert!(!order.served_signals_disagree());
    }
}
