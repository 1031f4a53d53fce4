//! An in-memory [`OrderManagement`] backend for unit tests.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
    Mutex,
    MutexGuard,
};

use chrono::{Duration, Utc};
use sqlx::types::Json;

use crate::{
    db_types::{ConditionalUpdate, NewOrder, Order, OrderNo, OrderUpdate, PaidUpdate, RefundStatus},
    traits::{OrderManagement, OrderStoreError},
};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    orders: Arc<Mutex<Vec<Order>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    /// While offline, every call fails with a database error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn orders(&self) -> Result<MutexGuard<'_, Vec<Order>>, OrderStoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(OrderStoreError::DatabaseError("The store is offline".into()));
        }
        self.orders.lock().map_err(|e| OrderStoreError::DatabaseError(e.to_string()))
    }
}

impl OrderManagement for MemoryStore {
    async fn fetch_order_by_no(&self, no: &OrderNo) -> Result<Option<Order>, OrderStoreError> {
        Ok(self.orders()?.iter().find(|o| &o.no == no).cloned())
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderStoreError> {
        Ok(self.orders()?.iter().find(|o| o.id == id).cloned())
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError> {
        let mut orders = self.orders()?;
        if let Some(existing) = orders.iter().find(|o| o.no == order.no) {
            return Ok((existing.clone(), false));
        }
        let order = Order {
            id: orders.len() as i64 + 1,
            no: order.no,
            total_amount: order.total_amount,
            paid_at: None,
            payment_method: None,
            payment_no: None,
            closed: false,
            refund_status: RefundStatus::Pending,
            extra: Json(Default::default()),
            created_at: order.created_at,
            updated_at: order.created_at,
        };
        orders.push(order.clone());
        Ok((order, true))
    }

    async fn mark_order_paid(&self, id: i64, payment: PaidUpdate) -> Result<ConditionalUpdate, OrderStoreError> {
        let mut orders = self.orders()?;
        let order = orders.iter_mut().find(|o| o.id == id).ok_or(OrderStoreError::OrderIdNotFound(id))?;
        if !order.is_payable() {
            return Ok(ConditionalUpdate::AlreadyApplied(order.clone()));
        }
        order.paid_at = Some(payment.paid_at);
        order.payment_method = Some(payment.payment_method);
        order.payment_no = Some(payment.payment_no);
        order.updated_at = Utc::now();
        Ok(ConditionalUpdate::Applied(order.clone()))
    }

    async fn update_order(&self, id: i64, update: OrderUpdate) -> Result<Order, OrderStoreError> {
        if update.is_empty() {
            return Err(OrderStoreError::OrderModificationNoOp);
        }
        let mut orders = self.orders()?;
        let order = orders.iter_mut().find(|o| o.id == id).ok_or(OrderStoreError::OrderIdNotFound(id))?;
        if let Some(status) = update.refund_status {
            order.refund_status = status;
        }
        if let Some(extra) = update.extra {
            order.extra = Json(extra);
        }
        if let Some(closed) = update.closed {
            order.closed = closed;
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn close_expired_orders(&self, ttl: Duration) -> Result<Vec<Order>, OrderStoreError> {
        let cutoff = Utc::now() - ttl;
        let mut orders = self.orders()?;
        let closed = orders
            .iter_mut()
            .filter(|o| o.is_payable() && o.created_at < cutoff)
            .map(|o| {
                o.closed = true;
                o.updated_at = Utc::now();
                o.clone()
            })
            .collect();
        Ok(closed)
    }
}
