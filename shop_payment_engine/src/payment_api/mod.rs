//! # Shop payment engine public API
//!
//! The `payment_api` module exposes the programmatic API of the payment engine.
//!
//! * [`notification_api`] reconciles payment and refund notifications from the gateways against stored orders.
//! * [`checkout_api`] prepares signed payment requests for open orders and closes orders that were never paid.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements [`crate::traits::OrderManagement`],
//! together with the event producers that should be told about state changes. Gateway clients are passed in on each
//! call.
//!
//! ```rust,ignore
//! use shop_payment_engine::{events::EventProducers, gateways::AlipayClient, NotificationApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = NotificationApi::new(db, EventProducers::default());
//! let alipay = AlipayClient::new(app_id, secret);
//! let ack = api.handle_payment_notification(&raw, &alipay).await?;
//! ```
pub mod checkout_api;
pub mod errors;
pub mod notification_api;
