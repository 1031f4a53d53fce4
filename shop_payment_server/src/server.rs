use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use futures::FutureExt;
use log::*;
use shop_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    CheckoutApi,
    NotificationApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    routes::{
        alipay_return,
        health,
        AlipayNotifyRoute,
        PreparePaymentRoute,
        WechatNotifyRoute,
        WechatRefundNotifyRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if config.expiry_worker {
        // Not awaited. The worker runs for as long as the server does.
        let _worker = start_expiry_worker(db.clone(), producers.clone(), config.order_ttl);
    }
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Fulfilment lives outside this server. Until a subscriber is wired in, paid and closed orders are logged so that
/// every transition leaves a trace.
pub fn create_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|ev| {
        async move {
            info!("📦️ Order {} has been paid and is ready for fulfilment. {}", ev.order.no, ev.order);
        }
        .boxed()
    });
    hooks.on_order_closed(|ev| {
        async move {
            info!("📦️ Order {} was closed without being paid", ev.order.no);
        }
        .boxed()
    });
    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let alipay = web::Data::new(config.alipay_client());
    let wechat = web::Data::new(config.wechat_client());
    let srv = HttpServer::new(move || {
        let notification_api = NotificationApi::new(db.clone(), producers.clone());
        let checkout_api = CheckoutApi::new(db.clone(), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("shop::access_log"))
            .app_data(web::Data::new(notification_api))
            .app_data(web::Data::new(checkout_api))
            .app_data(alipay.clone())
            .app_data(wechat.clone())
            .service(health)
            .service(alipay_return)
            // The notification routes must be registered before the catch-all payment route
            .service(AlipayNotifyRoute::<SqliteDatabase>::new())
            .service(WechatNotifyRoute::<SqliteDatabase>::new())
            .service(WechatRefundNotifyRoute::<SqliteDatabase>::new())
            .service(PreparePaymentRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
