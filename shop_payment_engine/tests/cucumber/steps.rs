use std::time::Duration;

use cucumber::{given, then, when};
use serde_json::Value;
use shop_common::Money;
use shop_payment_engine::{
    db_types::{NewOrder, OrderNo, OrderUpdate, PaidUpdate, PaymentMethod, RefundStatus},
    OrderManagement,
};

use crate::{
    cucumber::{world::ShopSystem, ShopWorld},
    support::{alipay, alipay_notification, wechat, wechat_notification, wechat_refund_notification},
};

#[given("a fresh install")]
async fn fresh_install(world: &mut ShopWorld) {
    world.system = Some(ShopSystem::new().await);
}

#[given(expr = "an unpaid order {string} for {word}")]
async fn unpaid_order(world: &mut ShopWorld, no: String, amount: String) {
    let amount = amount.parse::<Money>().expect("Not a valid amount");
    let (_, inserted) =
        world.system().db.insert_order(NewOrder::new(OrderNo::from(no), amount)).await.expect("Error inserting order");
    assert!(inserted, "Order already exists");
}

#[given(expr = "order {string} was paid via {word} with payment number {string}")]
async fn paid_order(world: &mut ShopWorld, no: String, method: String, payment_no: String) {
    let method = method.parse::<PaymentMethod>().expect("Not a payment method");
    let order = world.order(&no).await.expect("Order does not exist");
    world.system().db.mark_order_paid(order.id, PaidUpdate::now(method, payment_no)).await.expect("Error paying order");
}

#[given(expr = "a refund is in progress for order {string}")]
async fn refund_in_progress(world: &mut ShopWorld, no: String) {
    let order = world.order(&no).await.expect("Order does not exist");
    let update = OrderUpdate::default().with_refund_status(RefundStatus::Processing);
    world.system().db.update_order(order.id, update).await.expect("Error updating order");
}

#[given(expr = "order {string} has extra data {string} set to {string}")]
async fn set_extra(world: &mut ShopWorld, no: String, key: String, value: String) {
    let order = world.order(&no).await.expect("Order does not exist");
    let mut extra = order.extra.0.clone();
    extra.insert(key, Value::String(value));
    world.system().db.update_order(order.id, OrderUpdate::default().with_extra(extra)).await.expect("Error updating");
}

#[given(expr = "I take a snapshot of order {string}")]
async fn snapshot(world: &mut ShopWorld, no: String) {
    let order = world.order(&no).await;
    world.system_mut().snapshot = order;
}

#[when(expr = "Alipay notifies that order {string} has status {string} with trade number {string} for {word}")]
async fn alipay_notifies(world: &mut ShopWorld, no: String, status: String, trade_no: String, amount: String) {
    let raw = alipay_notification(&no, &trade_no, &status, &amount);
    let sys = world.system_mut();
    let ack = sys.api.handle_payment_notification(&raw, &alipay()).await.expect("Error handling notification");
    sys.last_notification = Some(raw);
    sys.last_ack = Some(ack);
}

#[when(expr = "WeChat notifies that order {string} has result {string} with transaction id {string} for {int} fen")]
async fn wechat_notifies(world: &mut ShopWorld, no: String, result: String, txid: String, fee: i64) {
    let raw = wechat_notification(&no, &txid, &result, fee);
    let sys = world.system_mut();
    let ack = sys.api.handle_payment_notification(&raw, &wechat()).await.expect("Error handling notification");
    sys.last_notification = Some(raw);
    sys.last_ack = Some(ack);
}

#[when("Alipay delivers the same notification again")]
async fn alipay_repeats(world: &mut ShopWorld) {
    let sys = world.system_mut();
    let raw = sys.last_notification.clone().expect("No notification has been sent yet");
    let ack = sys.api.handle_payment_notification(&raw, &alipay()).await.expect("Error handling notification");
    sys.last_ack = Some(ack);
}

#[when(expr = "WeChat notifies that the refund {string} for order {string} finished with status {string}")]
async fn wechat_refund(world: &mut ShopWorld, refund_no: String, no: String, status: String) {
    let raw = wechat_refund_notification(&no, &refund_no, &status);
    let sys = world.system_mut();
    let ack = sys.api.handle_refund_notification(&raw, &wechat()).await.expect("Error handling notification");
    sys.last_notification = Some(raw);
    sys.last_ack = Some(ack);
}

#[then("the gateway receives a success acknowledgement")]
async fn success_ack(world: &mut ShopWorld) {
    let ack = world.system().last_ack.as_ref().expect("No acknowledgement received");
    assert!(ack.is_success(), "Expected a success acknowledgement, got {ack:?}");
}

#[then("the gateway receives a failure acknowledgement")]
async fn failure_ack(world: &mut ShopWorld) {
    let ack = world.system().last_ack.as_ref().expect("No acknowledgement received");
    assert!(!ack.is_success(), "Expected a failure acknowledgement, got {ack:?}");
}

#[then(expr = "the acknowledgement body is {string}")]
async fn ack_body(world: &mut ShopWorld, body: String) {
    let ack = world.system().last_ack.as_ref().expect("No acknowledgement received");
    assert_eq!(ack.body, body);
}

#[then(expr = "order {string} is paid via {word} with payment number {string}")]
async fn order_is_paid(world: &mut ShopWorld, no: String, method: String, payment_no: String) {
    let method = method.parse::<PaymentMethod>().expect("Not a payment method");
    let order = world.order(&no).await.expect("Order does not exist");
    assert!(order.is_paid(), "Order {no} is not paid");
    assert_eq!(order.payment_method, Some(method));
    assert_eq!(order.payment_no, Some(payment_no));
}

#[then(expr = "order {string} is not paid")]
async fn order_is_not_paid(world: &mut ShopWorld, no: String) {
    let order = world.order(&no).await.expect("Order does not exist");
    assert!(!order.is_paid(), "Order {no} is paid");
}

#[then(expr = "order {string} is unchanged since the snapshot")]
async fn order_unchanged(world: &mut ShopWorld, no: String) {
    let order = world.order(&no).await;
    assert_eq!(order, world.system().snapshot, "Order {no} has changed");
}

#[then(expr = "order {string} does not exist")]
async fn order_does_not_exist(world: &mut ShopWorld, no: String) {
    assert!(world.order(&no).await.is_none(), "Order {no} exists");
}

#[then(expr = "the refund status of order {string} is {word}")]
async fn refund_status(world: &mut ShopWorld, no: String, status: String) {
    let status = status.parse::<RefundStatus>().expect("Not a refund status");
    let order = world.order(&no).await.expect("Order does not exist");
    assert_eq!(order.refund_status, status);
}

#[then(expr = "order {string} has extra data {string} set to {string}")]
async fn check_extra(world: &mut ShopWorld, no: String, key: String, value: String) {
    let order = world.order(&no).await.expect("Order does not exist");
    assert_eq!(order.extra_value(&key), Some(&Value::String(value)));
}

#[then(expr = "{int} order paid event(s) has/have been published")]
async fn paid_events(world: &mut ShopWorld, count: usize) {
    // handlers run on their own tasks
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(world.system().paid_event_count(), count);
}
