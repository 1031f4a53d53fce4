//! Shop Payment Engine
//!
//! The shop payment engine reconciles asynchronous payment notifications from Alipay and WeChat Pay with the orders of
//! an online shop. This library contains the core logic. It has no HTTP surface of its own; see the
//! `shop_payment_server` crate for that.
//!
//! The library is divided into these main sections:
//! 1. Order storage ([`traits`]). Backends implement [`OrderManagement`]. SQLite is the supported backend. The data
//!    types used in the store live in [`db_types`] and are public.
//! 2. Gateway clients ([`gateways`]). One client per provider verifies notification signatures, maps the provider's
//!    status vocabulary onto a normalized status, and builds the acknowledgement the provider expects.
//! 3. The public API ([`NotificationApi`] and [`CheckoutApi`]). The notification API applies the idempotent "mark as
//!    paid" transition and refund results. The checkout API prepares signed payment requests and expires stale orders.
//!
//! The engine also emits events that can be subscribed to ([`events`]). When an order is paid, an `OrderPaidEvent`
//! is published exactly once.
mod db;

pub mod db_types;
pub mod events;
pub mod gateways;
mod payment_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits;
pub use db::traits::{OrderManagement, OrderStoreError};
pub use payment_api::{
    checkout_api::CheckoutApi,
    errors::{CheckoutError, ReconcileError},
    notification_api::NotificationApi,
};
