#![allow(dead_code)]
pub mod prepare_env;

use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use log::*;
use shop_common::{Money, Secret};
use shop_payment_engine::{
    db_types::{NewOrder, Order, OrderNo},
    events::{EventHandler, EventProducers, OrderPaidEvent},
    gateways::{AlipayClient, RawNotification, WechatClient},
    OrderManagement,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::support::prepare_env::{prepare_test_env, random_db_path};

pub const ALIPAY_APP_ID: &str = "2021000000000001";
pub const ALIPAY_SECRET: &str = "alipay-test-secret";
pub const WECHAT_APP_ID: &str = "wx-test-app";
pub const WECHAT_MCH_ID: &str = "1900000109";
pub const WECHAT_API_KEY: &str = "wechat-test-api-key";

pub fn alipay() -> AlipayClient {
    AlipayClient::new(ALIPAY_APP_ID, Secret::from(ALIPAY_SECRET))
}

pub fn wechat() -> WechatClient {
    WechatClient::new(WECHAT_APP_ID, WECHAT_MCH_ID, Secret::from(WECHAT_API_KEY))
}

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// A correctly signed Alipay payment notification.
pub fn alipay_notification(order_no: &str, trade_no: &str, status: &str, amount: &str) -> RawNotification {
    let mut p = params(&[
        ("app_id", ALIPAY_APP_ID),
        ("out_trade_no", order_no),
        ("trade_no", trade_no),
        ("trade_status", status),
        ("total_amount", amount),
    ]);
    alipay().sign(&mut p);
    RawNotification::new(p)
}

/// A correctly signed WeChat payment notification.
pub fn wechat_notification(order_no: &str, transaction_id: &str, result_code: &str, fee: i64) -> RawNotification {
    let fee = fee.to_string();
    let mut p = params(&[
        ("appid", WECHAT_APP_ID),
        ("mch_id", WECHAT_MCH_ID),
        ("out_trade_no", order_no),
        ("transaction_id", transaction_id),
        ("result_code", result_code),
        ("total_fee", fee.as_str()),
    ]);
    wechat().sign(&mut p);
    RawNotification::new(p)
}

/// A correctly signed WeChat refund-result notification.
pub fn wechat_refund_notification(order_no: &str, refund_no: &str, refund_status: &str) -> RawNotification {
    let mut p = params(&[
        ("appid", WECHAT_APP_ID),
        ("mch_id", WECHAT_MCH_ID),
        ("out_trade_no", order_no),
        ("out_refund_no", refund_no),
        ("refund_status", refund_status),
    ]);
    wechat().sign_refund(&mut p);
    RawNotification::new(p)
}

pub async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Failed to remove database {url}: {e}");
    }
}

pub async fn seed_order(db: &SqliteDatabase, no: &str, cents: i64) -> Order {
    let (order, inserted) =
        db.insert_order(NewOrder::new(OrderNo::from(no), Money::from_cents(cents))).await.expect("Error seeding order");
    assert!(inserted, "Order {no} already existed");
    order
}

/// Counts the order-paid events published through the returned producers.
pub struct PaidEventCounter {
    handler: EventHandler<OrderPaidEvent>,
    count: Arc<AtomicUsize>,
}

impl PaidEventCounter {
    pub fn new() -> (Self, EventProducers) {
        let count = Arc::new(AtomicUsize::new(0));
        let c2 = count.clone();
        let handler = EventHandler::new(
            16,
            Arc::new(move |ev: OrderPaidEvent| {
                let count = c2.clone();
                Box::pin(async move {
                    debug!("🪝️ Order paid: {}", ev.order);
                    count.fetch_add(1, Ordering::SeqCst);
                }) as Pin<Box<dyn Future<Output = ()> + Send>>
            }),
        );
        let producers = EventProducers { order_paid_producer: vec![handler.subscribe()], ..Default::default() };
        (Self { handler, count }, producers)
    }

    /// Drains the channel. Every producer must have been dropped first, or this never returns.
    pub async fn total(self) -> usize {
        let count = self.count.clone();
        self.handler.start_handler().await;
        count.load(Ordering::SeqCst)
    }
}
