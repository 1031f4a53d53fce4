use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    db_types::{Order, OrderNo},
    events::{EventProducers, OrderClosedEvent},
    gateways::{GatewayClient, PaymentRequest},
    payment_api::errors::CheckoutError,
    traits::OrderManagement,
};

/// `CheckoutApi` covers the buyer-facing side of a payment: building the signed request that starts a payment, and
/// closing orders that were abandoned before payment.
pub struct CheckoutApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> CheckoutApi<B>
where B: OrderManagement
{
    /// Builds a signed payment request for the order `no` on `gateway`.
    ///
    /// Only orders that are neither paid nor closed can be paid for.
    pub async fn prepare_payment<G: GatewayClient>(
        &self,
        no: &OrderNo,
        gateway: &G,
    ) -> Result<PaymentRequest, CheckoutError> {
        let order = self.db.fetch_order_by_no(no).await?.ok_or_else(|| CheckoutError::OrderNotFound(no.clone()))?;
        if !order.is_payable() {
            debug!("🛒️ Order {no} cannot be paid for. {order}");
            return Err(CheckoutError::InvalidOrderState(no.clone()));
        }
        let request = gateway.build_payment_request(&order);
        info!("🛒️ Prepared a {} payment request for order {no} ({})", request.method, order.total_amount);
        Ok(request)
    }

    /// Closes every order that is still unpaid `ttl` after it was created. Late payment notifications for these
    /// orders will be refused.
    pub async fn close_expired_orders(&self, ttl: Duration) -> Result<Vec<Order>, CheckoutError> {
        let closed = self.db.close_expired_orders(ttl).await?;
        for order in &closed {
            info!("🛒️ Order {} expired without payment and has been closed", order.no);
            self.producers.publish_order_closed(OrderClosedEvent::new(order.clone())).await;
        }
        Ok(closed)
    }
}
