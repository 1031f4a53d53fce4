use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use cucumber::World;
use log::*;
use shop_payment_engine::{
    db_types::{Order, OrderNo},
    events::{EventHandlers, EventHooks, OrderPaidEvent},
    gateways::{Ack, RawNotification},
    NotificationApi,
    OrderManagement,
    SqliteDatabase,
};

use crate::support::prepare_env::{prepare_test_env, random_db_path};

#[derive(Default, Debug, World)]
pub struct ShopWorld {
    pub system: Option<ShopSystem>,
}

#[derive(Debug)]
pub struct ShopSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub api: NotificationApi<SqliteDatabase>,
    pub paid_events: Arc<AtomicUsize>,
    pub last_notification: Option<RawNotification>,
    pub last_ack: Option<Ack>,
    pub snapshot: Option<Order>,
}

impl ShopWorld {
    pub fn system(&self) -> &ShopSystem {
        self.system.as_ref().expect("System not initialised. Start the scenario with 'Given a fresh install'")
    }

    pub fn system_mut(&mut self) -> &mut ShopSystem {
        self.system.as_mut().expect("System not initialised. Start the scenario with 'Given a fresh install'")
    }

    pub async fn order(&self, no: &str) -> Option<Order> {
        self.system().db.fetch_order_by_no(&OrderNo::from(no)).await.expect("Error fetching order")
    }
}

impl ShopSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let paid_events = Arc::new(AtomicUsize::new(0));
        let counter = paid_events.clone();
        let mut hooks = EventHooks::default();
        hooks.on_order_paid(move |ev: OrderPaidEvent| {
            let counter = counter.clone();
            Box::pin(async move {
                info!("🪝️ Order paid: {}", ev.order);
                counter.fetch_add(1, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let handlers = EventHandlers::new(16, hooks);
        let api = NotificationApi::new(db.clone(), handlers.producers());
        handlers.start_handlers().await;
        Self { db_path: url, db, api, paid_events, last_notification: None, last_ack: None, snapshot: None }
    }

    pub fn paid_event_count(&self) -> usize {
        self.paid_events.load(Ordering::SeqCst)
    }
}
