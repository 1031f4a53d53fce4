use std::fmt::Debug;

use log::*;
use serde_json::Value;

use crate::{
    db_types::{ConditionalUpdate, Order, OrderUpdate, PaidUpdate, RefundStatus, REFUND_FAILED_CODE_KEY},
    events::{EventProducers, OrderPaidEvent},
    gateways::{Ack, GatewayClient, NotificationStatus, RawNotification, RefundGatewayClient, RefundResult},
    payment_api::errors::ReconcileError,
    traits::OrderManagement,
};

/// `NotificationApi` reconciles the asynchronous payment and refund callbacks from the payment gateways with the
/// orders in the store.
///
/// Gateways keep re-sending a notification until they receive a success acknowledgement, and may deliver the same
/// notification several times concurrently. Every method here is therefore idempotent: an order is marked as paid at
/// most once, and the order-paid event is published once per transition.
pub struct NotificationApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for NotificationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationApi")
    }
}

impl<B> NotificationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> NotificationApi<B>
where B: OrderManagement
{
    /// Handles a "payment succeeded" notification from `gateway`.
    ///
    /// Forged, irrelevant (non-success status) and unknown-order notifications are answered with the gateway's
    /// failure acknowledgement. Notifications for orders that are already paid are answered with a success
    /// acknowledgement and change nothing. Only a failure to reach the order store is returned as an error.
    pub async fn handle_payment_notification<G: GatewayClient>(
        &self,
        raw: &RawNotification,
        gateway: &G,
    ) -> Result<Ack, ReconcileError> {
        let method = gateway.payment_method();
        let notification = match gateway.verify(raw) {
            Ok(n) => n,
            Err(e) => {
                warn!("🔔️ Rejected {method} notification. {e}");
                return Ok(gateway.failure_ack(&e.to_string()));
            },
        };
        let order_no = &notification.order_no;
        if notification.status != NotificationStatus::Succeeded {
            info!("🔔️ {method} notification for {order_no} has status {:?}. Ignoring it.", notification.status);
            return Ok(gateway.failure_ack("payment not successful"));
        }
        let order = match self.db.fetch_order_by_no(order_no).await? {
            Some(order) => order,
            None => {
                warn!("🔔️ {method} reported a payment for order {order_no}, which does not exist.");
                return Ok(gateway.failure_ack("order not found"));
            },
        };
        if order.is_paid() {
            debug!("🔔️ Order {order_no} is already paid. Acknowledging the repeat {method} notification.");
            return Ok(gateway.success_ack());
        }
        if order.closed {
            warn!("🔔️ {method} reported a payment for order {order_no}, but the order is closed.");
            return Ok(gateway.failure_ack("order closed"));
        }
        if let Some(amount) = notification.amount.filter(|a| *a != order.total_amount) {
            warn!(
                "🔔️ {method} reported {amount} paid for order {order_no}, but the order total is {}. Marking it as \
                 paid anyway, since the funds have been captured.",
                order.total_amount
            );
        }
        let payment = PaidUpdate::now(method, notification.transaction_id.clone());
        match self.db.mark_order_paid(order.id, payment).await? {
            ConditionalUpdate::Applied(order) => {
                info!("🔔️ Order {order_no} paid via {method}. Transaction id: {}", notification.transaction_id);
                self.call_order_paid_hook(order).await;
                Ok(gateway.success_ack())
            },
            ConditionalUpdate::AlreadyApplied(order) if order.is_paid() => {
                debug!("🔔️ Order {order_no} was paid by a concurrent notification. Nothing to do.");
                Ok(gateway.success_ack())
            },
            ConditionalUpdate::AlreadyApplied(_) => {
                warn!("🔔️ Order {order_no} was closed before the {method} payment could be recorded.");
                Ok(gateway.failure_ack("order closed"))
            },
        }
    }

    async fn call_order_paid_hook(&self, order: Order) {
        debug!("🔔️ Notifying order paid hook subscribers");
        self.producers.publish_order_paid(OrderPaidEvent::new(order)).await;
    }

    /// Handles a refund-result notification.
    ///
    /// A successful refund sets the refund status to `success`. Any other result sets it to `failed` and records the
    /// provider's result code in the order's `extra` data, keeping whatever else is stored there. The success
    /// acknowledgement confirms receipt of the notification, whatever the refund outcome was.
    pub async fn handle_refund_notification<G: RefundGatewayClient>(
        &self,
        raw: &RawNotification,
        gateway: &G,
    ) -> Result<Ack, ReconcileError> {
        let notification = match gateway.verify_refund(raw) {
            Ok(n) => n,
            Err(e) => {
                warn!("💸️ Rejected refund notification. {e}");
                return Ok(gateway.refund_failure_ack());
            },
        };
        let order_no = &notification.order_no;
        let order = match self.db.fetch_order_by_no(order_no).await? {
            Some(order) => order,
            None => {
                warn!("💸️ Refund notification received for order {order_no}, which does not exist.");
                return Ok(gateway.refund_failure_ack());
            },
        };
        if !order.is_paid() {
            warn!("💸️ Refund notification received for order {order_no}, which was never paid.");
            return Ok(gateway.refund_failure_ack());
        }
        match order.refund_status {
            RefundStatus::Pending => {
                warn!("💸️ Order {order_no} has no refund in progress, but a refund result arrived. Applying it.")
            },
            status if status.is_resolved() => {
                debug!("💸️ Order {order_no} refund is already {status}. Re-applying the repeat notification.")
            },
            _ => {},
        }
        let update = match notification.result {
            RefundResult::Success => OrderUpdate::default().with_refund_status(RefundStatus::Success),
            RefundResult::Failed(code) => {
                let mut extra = order.extra.0.clone();
                extra.insert(REFUND_FAILED_CODE_KEY.to_string(), Value::String(code));
                OrderUpdate::default().with_refund_status(RefundStatus::Failed).with_extra(extra)
            },
        };
        let updated = self.db.update_order(order.id, update).await?;
        info!("💸️ Refund for order {order_no} is now {}", updated.refund_status);
        Ok(gateway.refund_success_ack())
    }
}
