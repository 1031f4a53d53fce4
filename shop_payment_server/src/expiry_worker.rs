use chrono::Duration;
use log::*;
use shop_payment_engine::{db_types::Order, events::EventProducers, CheckoutApi, SqliteDatabase};
use tokio::task::JoinHandle;

const EXPIRY_CHECK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker(db: SqliteDatabase, producers: EventProducers, order_ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(EXPIRY_CHECK_INTERVAL);
        let api = CheckoutApi::new(db, producers);
        info!(
            "🕰️ Unpaid order expiry worker started. Orders are closed {} minutes after creation.",
            order_ttl.num_minutes()
        );
        loop {
            timer.tick().await;
            trace!("🕰️ Running unpaid order expiry job");
            match api.close_expired_orders(order_ttl).await {
                Ok(closed) if closed.is_empty() => trace!("🕰️ No orders expired"),
                Ok(closed) => {
                    info!("🕰️ {} orders expired", closed.len());
                    debug!("🕰️ Expired orders: {}", order_list(&closed));
                },
                Err(e) => {
                    error!("🕰️ Error running unpaid order expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders.iter().map(|o| format!("[{}] order_no: {}", o.id, o.no.as_str())).collect::<Vec<String>>().join(", ")
}
