//! Kitchen Monitor Example
//!
//! Simulates a kitchen dashboard attached to an in-memory store while a
//! "floor staff" task walks two orders through their lifecycle.
//!
//! Run: cargo run -p sync-client --example kitchen_monitor
//! Env: SYNC_POLL_INTERVAL_MS, RUST_LOG (read from .env when present)

use chrono::{Duration as ChronoDuration, Utc};
use shared::order::{Item, ItemStatus, Order, OrderStatus, PaymentMethod, PaymentStatus};
use std::sync::Arc;
use std::time::Duration;
use sync_client::{
    InMemoryChangeFeed, InMemoryOrderStore, StatusUpdater, SubscriptionKey, SyncClient,
    SyncConfig, SyncEvent, init_logger,
};

const TENANT: &str = "demo-kitchen";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logger();

    let mut config = SyncConfig::kitchen();
    if let Ok(ms) = std::env::var("SYNC_POLL_INTERVAL_MS")
        && let Ok(ms) = ms.parse::<u64>()
    {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }

    let feed = InMemoryChangeFeed::new();
    let store = InMemoryOrderStore::with_feed(feed.clone());
    store.insert(demo_order("1001", PaymentMethod::Cash, 2));
    store.insert(demo_order("1002", PaymentMethod::Online, 1));

    let client = SyncClient::new(Arc::new(store.clone()), Arc::new(feed.clone()), config);
    let handle = client.attach(SubscriptionKey::tenant(TENANT));
    let mut events = handle.subscribe();

    println!("\n🍳 Kitchen monitor attached to {}", handle.key());

    let staff = tokio::spawn(run_staff(store.clone(), feed.clone()));

    let watch = async {
        while let Ok(event) = events.recv().await {
            match event {
                SyncEvent::Updated(order) => println!(
                    "  [{}] {:<16} items served {}/{}",
                    order.order_number,
                    order.order_status.label(),
                    order.served_count(),
                    order.items.len()
                ),
                SyncEvent::Notified(n) => println!("  🔔 {} ({})", n.message, n.order_id),
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = watch => {}
        result = staff => result??,
    }

    // 留一个轮询周期让看板收敛
    tokio::time::sleep(client.config().poll_interval).await;
    println!("\nStill active:");
    for order in handle.active_orders() {
        println!("  {} {}", order.order_number, order.order_status);
    }

    handle.dispose().await;
    Ok(())
}

/// Floor staff and payment webhook activity
async fn run_staff(store: InMemoryOrderStore, feed: InMemoryChangeFeed) -> anyhow::Result<()> {
    let updater = StatusUpdater::new(Arc::new(store.clone()));
    let pause = || tokio::time::sleep(Duration::from_millis(700));

    updater.advance_order("1001", OrderStatus::Received).await?;
    pause().await;

    match updater.advance_order("1002", OrderStatus::Received).await {
        Err(e) if e.is_payment_not_confirmed() => println!("  ⛔ 1002: {}", e),
        other => {
            other?;
        }
    }
    store.set_payment_status("1002", PaymentStatus::Paid)?;
    updater.advance_order("1002", OrderStatus::Received).await?;
    pause().await;

    updater.advance_order("1001", OrderStatus::Preparing).await?;
    updater.advance_order("1002", OrderStatus::Preparing).await?;
    pause().await;

    // push 掉线, 剩余变化靠轮询
    feed.disconnect_all("demo: network blip");
    for index in 0..2 {
        updater.advance_item("1001", index, ItemStatus::Served).await?;
        pause().await;
    }
    updater.advance_order("1001", OrderStatus::Served).await?;
    updater.advance_order("1002", OrderStatus::Ready).await?;
    pause().await;

    Ok(())
}

fn demo_order(number: &str, method: PaymentMethod, items: usize) -> Order {
    let created = Utc::now() - ChronoDuration::minutes(5);
    let items = (0..items)
        .map(|i| Item {
            menu_ref: format!("menu-{}", i),
            name: format!("Dish {}", i + 1),
            unit_price: 5.0,
            quantity: 1,
            item_status: ItemStatus::Queued,
            special_instructions: None,
        })
        .collect::<Vec<_>>();
    let subtotal = 5.0 * items.len() as f64;
    Order {
        id: number.to_string(),
        tenant_id: TENANT.to_string(),
        table_ref: Some(format!("T{}", &number[3..])),
        order_number: format!("#{}", number),
        order_token: format!("demo-{}", number),
        order_status: OrderStatus::PendingPayment,
        payment_status: PaymentStatus::Pending,
        payment_method: method,
        items,
        subtotal,
        tax: 0.0,
        discount: 0.0,
        total: subtotal,
        created_at: created,
        updated_at: created,
    }
}
