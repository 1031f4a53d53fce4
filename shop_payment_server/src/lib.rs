//! # Shop payment server
//! This crate hosts the HTTP front end of the shop payment gateway. It is responsible for:
//! Receiving asynchronous payment and refund notifications from Alipay and WeChat Pay.
//! Handing them to the reconciler in `shop_payment_engine`, and answering each provider in the format it expects.
//! Preparing signed payment requests for unpaid orders.
//! Closing orders that have gone unpaid for too long.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/payment/alipay/notify`: Alipay's server-to-server payment notification (form encoded).
//! * `/payment/alipay/return`: The buyer's browser redirect after paying with Alipay.
//! * `/payment/wechat/notify`: WeChat Pay's payment notification (JSON).
//! * `/payment/wechat/refund_notify`: WeChat Pay's refund result notification (JSON).
//! * `/payment/{order_no}/{method}`: Builds a signed payment request for an order.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod routes;
pub mod server;
