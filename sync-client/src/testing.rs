//! Unit test fixtures

use chrono::{TimeZone, Utc};
use shared::order::{Item, ItemStatus, Order, OrderStatus, PaymentMethod, PaymentStatus};

/// Cash order with three queued items
pub(crate) fn sample_order(id: &str, status: OrderStatus) -> Order {
    let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
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
        tenant_id: "tenant-1".to_string(),
        table_ref: Some("T1".to_string()),
        order_number: format!("N-{}", id),
        order_token: format!("tok-{}", id),
        order_status: status,
        payment_status: PaymentStatus::Pending,
        payment_method: PaymentMethod::Cash,
        items: vec![
            item("m1", "Masala Dosa", 6.0),
            item("m2", "Idli", 4.0),
            item("m3", "Filter Coffee", 2.0),
        ],
        subtotal: 12.0,
        tax: 0.6,
        discount: 0.0,
        total: 12.6,
        created_at: created,
        updated_at: created,
    }
}
