use chrono::Duration;
use thiserror::Error;

use crate::db_types::{ConditionalUpdate, NewOrder, Order, OrderNo, OrderUpdate, PaidUpdate};

/// The `OrderManagement` trait defines the behaviour of an order store backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Fetches the order with the given external order number, or `None` if it does not exist.
    async fn fetch_order_by_no(&self, no: &OrderNo) -> Result<Option<Order>, OrderStoreError>;

    /// Fetches the order with the given internal id, or `None` if it does not exist.
    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderStoreError>;

    /// Inserts a new, unpaid order. This call is idempotent.
    ///
    /// Returns the stored order, and `true` if it was inserted, or `false` if an order with the same number already
    /// existed (in which case the existing record is returned untouched).
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError>;

    /// Writes `paid_at`, `payment_method` and `payment_no` in a single statement, on condition that the order is
    /// still unpaid and open at the time of the write.
    ///
    /// If the condition does not hold, nothing is written and the current record is returned as
    /// [`ConditionalUpdate::AlreadyApplied`].
    async fn mark_order_paid(&self, id: i64, payment: PaidUpdate) -> Result<ConditionalUpdate, OrderStoreError>;

    /// Applies a plain partial update to the order. There is no guard on the current state.
    async fn update_order(&self, id: i64, update: OrderUpdate) -> Result<Order, OrderStoreError>;

    /// Closes all orders that are still unpaid and were created longer ago than `ttl`.
    ///
    /// Returns the orders that were closed.
    async fn close_expired_orders(&self, ttl: Duration) -> Result<Vec<Order>, OrderStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("The requested order change would result in a no-op.")]
    OrderModificationNoOp,
    #[error("Could not serialize order data. {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}
