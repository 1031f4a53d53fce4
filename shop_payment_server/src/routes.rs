//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into the engine. Keep this module neat and tidy 🙏
//!
//! The notification handlers never decide anything themselves. They turn the request into a [`RawNotification`],
//! hand it to the reconciler together with the right gateway client, and write the resulting [`Ack`] back verbatim.
//! The gateways only stop retrying when they see their own success body, so the ack's status, content type and body
//! must reach the wire untouched.
//!
//! Since each worker thread processes its requests sequentially, every handler here is async and never blocks.
use std::collections::BTreeMap;

use actix_web::{get, http::StatusCode, web, Error, HttpResponse, Responder};
use log::*;
use serde_json::Value;
use shop_payment_engine::{
    db_types::{OrderNo, PaymentMethod},
    gateways::{Ack, AlipayClient, GatewayClient, RawNotification, RefundGatewayClient, WechatClient},
    traits::OrderManagement,
    CheckoutApi,
    NotificationApi,
};

use crate::{data_objects::JsonResponse, errors::ServerError};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

/// Writes a gateway acknowledgement to the wire exactly as the gateway client produced it.
pub fn ack_response(ack: Ack) -> HttpResponse {
    let status = StatusCode::from_u16(ack.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).content_type(ack.content_type).body(ack.body)
}

route!(alipay_notify => Post "/payment/alipay/notify" impl OrderManagement);
/// Alipay posts its payment notifications as `application/x-www-form-urlencoded` parameters.
pub async fn alipay_notify<B: OrderManagement>(
    form: Result<web::Form<BTreeMap<String, String>>, Error>,
    api: web::Data<NotificationApi<B>>,
    gateway: web::Data<AlipayClient>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received Alipay payment notification");
    let raw = match read_payload(form) {
        Ok(form) => RawNotification::new(form.into_inner()),
        Err(e) => return Ok(ack_response(gateway.failure_ack(&e.to_string()))),
    };
    let ack = api.handle_payment_notification(&raw, gateway.get_ref()).await?;
    Ok(ack_response(ack))
}

/// The buyer's browser lands here after paying on Alipay's site. The signed query parameters only tell the buyer
/// whether the payment went through. The order itself is updated by [`alipay_notify`].
#[get("/payment/alipay/return")]
pub async fn alipay_return(
    query: web::Query<BTreeMap<String, String>>,
    gateway: web::Data<AlipayClient>,
) -> HttpResponse {
    trace!("💻️ Received Alipay return redirect");
    let raw = RawNotification::new(query.into_inner());
    match gateway.verify_return(&raw) {
        Ok(order_no) => {
            info!("💻️ Buyer returned from Alipay after paying for order {order_no}");
            let message = format!("Payment for order {} received", order_no.as_str());
            HttpResponse::Ok().json(JsonResponse::success(message))
        },
        Err(e) => {
            warn!("💻️ Rejected Alipay return parameters. {e}");
            HttpResponse::BadRequest().json(JsonResponse::failure("Payment could not be verified"))
        },
    }
}

route!(wechat_notify => Post "/payment/wechat/notify" impl OrderManagement);
pub async fn wechat_notify<B: OrderManagement>(
    body: Result<web::Json<Value>, Error>,
    api: web::Data<NotificationApi<B>>,
    gateway: web::Data<WechatClient>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received WeChat Pay payment notification");
    let raw = match read_json_notification(body) {
        Ok(raw) => raw,
        Err(e) => return Ok(ack_response(gateway.failure_ack(&e.to_string()))),
    };
    let ack = api.handle_payment_notification(&raw, gateway.get_ref()).await?;
    Ok(ack_response(ack))
}

route!(wechat_refund_notify => Post "/payment/wechat/refund_notify" impl OrderManagement);
pub async fn wechat_refund_notify<B: OrderManagement>(
    body: Result<web::Json<Value>, Error>,
    api: web::Data<NotificationApi<B>>,
    gateway: web::Data<WechatClient>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received WeChat Pay refund notification");
    let raw = match read_json_notification(body) {
        Ok(raw) => raw,
        Err(_) => return Ok(ack_response(gateway.refund_failure_ack())),
    };
    let ack = api.handle_refund_notification(&raw, gateway.get_ref()).await?;
    Ok(ack_response(ack))
}

/// Gateways only understand their own acknowledgement format, so an unreadable body is reported to the handler
/// instead of being answered by actix's default extractor error response.
fn read_payload<T>(payload: Result<T, Error>) -> Result<T, ServerError> {
    payload.map_err(|e| {
        warn!("💻️ Could not read notification body. {e}");
        ServerError::CouldNotDeserializePayload
    })
}

fn read_json_notification(body: Result<web::Json<Value>, Error>) -> Result<RawNotification, ServerError> {
    let body = read_payload(body)?;
    RawNotification::from_json(&body).ok_or_else(|| {
        warn!("💻️ Notification body is not a JSON object");
        ServerError::CouldNotDeserializePayload
    })
}

route!(prepare_payment => Post "/payment/{order_no}/{method}" impl OrderManagement);
/// Returns the signed parameters the buyer needs to start paying for `order_no` with `method` (`alipay` or `wechat`).
pub async fn prepare_payment<B: OrderManagement>(
    path: web::Path<(String, String)>,
    api: web::Data<CheckoutApi<B>>,
    alipay: web::Data<AlipayClient>,
    wechat: web::Data<WechatClient>,
) -> Result<HttpResponse, ServerError> {
    let (order_no, method) = path.into_inner();
    let method = method.parse::<PaymentMethod>().map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    let order_no = OrderNo::from(order_no);
    debug!("💻️ Preparing {method} payment for order {order_no}");
    let request = match method {
        PaymentMethod::Alipay => api.prepare_payment(&order_no, alipay.get_ref()).await?,
        PaymentMethod::Wechat => api.prepare_payment(&order_no, wechat.get_ref()).await?,
    };
    Ok(HttpResponse::Ok().json(request))
}
