use std::collections::BTreeMap;

use actix_web::{
    body::MessageBody,
    http::{header::CONTENT_TYPE, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use chrono::Utc;
use log::debug;
use shop_common::{Money, Secret};
use shop_payment_engine::{
    db_types::{Order, OrderNo, PaymentMethod, RefundStatus},
    gateways::{AlipayClient, WechatClient},
};

pub const ALIPAY_APP_ID: &str = "2021000000000001";
pub const WECHAT_APP_ID: &str = "wx-app";
pub const WECHAT_MCH_ID: &str = "1900000109";

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: String,
}

pub fn alipay() -> AlipayClient {
    AlipayClient::new(ALIPAY_APP_ID, Secret::from("alipay-test-secret"))
}

pub fn wechat() -> WechatClient {
    WechatClient::new(WECHAT_APP_ID, WECHAT_MCH_ID, Secret::from("wechat-test-api-key"))
}

pub fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn signed_alipay(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut params = params(pairs);
    alipay().sign(&mut params);
    params
}

pub fn signed_wechat(pairs: &[(&str, &str)]) -> serde_json::Value {
    let mut params = params(pairs);
    wechat().sign(&mut params);
    serde_json::to_value(params).unwrap()
}

pub fn signed_wechat_refund(pairs: &[(&str, &str)]) -> serde_json::Value {
    let mut params = params(pairs);
    wechat().sign_refund(&mut params);
    serde_json::to_value(params).unwrap()
}

pub fn unpaid_order(id: i64, no: &str, cents: i64) -> Order {
    let now = Utc::now();
    Order {
        id,
        no: OrderNo::from(no),
        total_amount: Money::from_cents(cents),
        paid_at: None,
        payment_method: None,
        payment_no: None,
        closed: false,
        refund_status: RefundStatus::Pending,
        extra: Default::default(),
        created_at: now,
        updated_at: now,
    }
}

pub fn paid_order(id: i64, no: &str, cents: i64, method: PaymentMethod, payment_no: &str) -> Order {
    let mut order = unpaid_order(id, no, cents);
    order.paid_at = Some(Utc::now());
    order.payment_method = Some(method);
    order.payment_no = Some(payment_no.to_string());
    order
}

pub async fn send(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig) + 'static) -> TestResponse {
    let app = test::init_service(App::new().configure(configure)).await;
    debug!("Making request");
    let res = test::call_service(&app, req.to_request()).await;
    let status = res.status();
    let content_type =
        res.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    TestResponse { status, content_type, body }
}

pub async fn post_form(
    path: &str,
    form: &BTreeMap<String, String>,
    configure: impl FnOnce(&mut ServiceConfig) + 'static,
) -> TestResponse {
    send(TestRequest::post().uri(path).set_form(form), configure).await
}

pub async fn post_json(
    path: &str,
    json: &serde_json::Value,
    configure: impl FnOnce(&mut ServiceConfig) + 'static,
) -> TestResponse {
    send(TestRequest::post().uri(path).set_json(json), configure).await
}
