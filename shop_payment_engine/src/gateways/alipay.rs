use std::collections::BTreeMap;

use log::*;
use shop_common::{Money, Secret};

use super::{
    signature::{calculate_hmac, canonical_string, verify_hmac, SIGN_KEY, SIGN_TYPE_KEY},
    Ack,
    GatewayClient,
    NormalizedNotification,
    NotificationStatus,
    PaymentRequest,
    RawNotification,
    VerificationError,
    CONTENT_TYPE_TEXT,
};
use crate::db_types::{Order, OrderNo, PaymentMethod};

pub const ALIPAY_SIGN_TYPE: &str = "HMAC-SHA256";
const PAGE_PAY_METHOD: &str = "alipay.trade.page.pay";
const ALIPAY_SUCCESS: &str = "success";
const ALIPAY_FAIL: &str = "fail";

/// Client for Alipay's redirect-based web payments.
///
/// Notifications arrive as form parameters. Both `TRADE_SUCCESS` and `TRADE_FINISHED` mean the buyer has paid.
#[derive(Debug, Clone)]
pub struct AlipayClient {
    app_id: String,
    secret: Secret<String>,
}

impl AlipayClient {
    pub fn new<S: Into<String>>(app_id: S, secret: Secret<String>) -> Self {
        Self { app_id: app_id.into(), secret }
    }

    pub fn app_id(&self) -> &str {
        self.app_id.as_str()
    }

    /// Signs `params` in place, adding `sign_type` and `sign`.
    pub fn sign(&self, params: &mut BTreeMap<String, String>) {
        params.insert(SIGN_TYPE_KEY.into(), ALIPAY_SIGN_TYPE.into());
        let sig = calculate_hmac(self.secret.reveal().as_bytes(), &canonical_string(params));
        params.insert(SIGN_KEY.into(), sig);
    }

    /// Checks the signature and the addressee of a set of Alipay parameters. This is shared by the server-to-server
    /// notification and the browser return redirect.
    pub fn verify_signature(&self, raw: &RawNotification) -> Result<(), VerificationError> {
        let sign_type = raw.require(SIGN_TYPE_KEY)?;
        if sign_type != ALIPAY_SIGN_TYPE {
            return Err(VerificationError::UnsupportedSignType(sign_type.to_string()));
        }
        let sig = raw.get(SIGN_KEY).filter(|s| !s.is_empty()).ok_or(VerificationError::MissingSignature)?;
        verify_hmac(self.secret.reveal().as_bytes(), &canonical_string(raw.params()), sig)?;
        match raw.get("app_id") {
            Some(app_id) if app_id != self.app_id => Err(VerificationError::AccountMismatch(app_id.to_string())),
            _ => Ok(()),
        }
    }

    /// Verifies the parameters Alipay appends to the buyer's return redirect. Returns the order number the buyer
    /// paid for. The return page never changes order state; only the notification does that.
    pub fn verify_return(&self, raw: &RawNotification) -> Result<OrderNo, VerificationError> {
        self.verify_signature(raw)?;
        let order_no = raw.require("out_trade_no")?;
        Ok(OrderNo::from(order_no))
    }

    fn status_from_code(code: &str) -> NotificationStatus {
        match code {
            "TRADE_SUCCESS" | "TRADE_FINISHED" => NotificationStatus::Succeeded,
            other => NotificationStatus::Other(other.to_string()),
        }
    }
}

impl GatewayClient for AlipayClient {
    fn payment_method(&self) -> PaymentMethod {
        PaymentMethod::Alipay
    }

    fn verify(&self, raw: &RawNotification) -> Result<NormalizedNotification, VerificationError> {
        self.verify_signature(raw)?;
        let order_no = OrderNo::from(raw.require("out_trade_no")?);
        let transaction_id = raw.require("trade_no")?.to_string();
        let status = Self::status_from_code(raw.require("trade_status")?);
        let amount = match raw.get("total_amount").filter(|s| !s.is_empty()) {
            Some(s) => Some(s.parse::<Money>().map_err(|_| VerificationError::InvalidField {
                field: "total_amount",
                value: s.to_string(),
            })?),
            None => None,
        };
        trace!("💳️ Alipay notification for {order_no} verified. Status: {status:?}");
        Ok(NormalizedNotification { order_no, transaction_id, status, amount })
    }

    fn success_ack(&self) -> Ack {
        Ack::success(200, CONTENT_TYPE_TEXT, ALIPAY_SUCCESS)
    }

    /// Alipay only understands the literal `fail`. The reason is only logged.
    fn failure_ack(&self, reason: &str) -> Ack {
        debug!("💳️ Sending failure acknowledgement to Alipay: {reason}");
        Ack::failure(200, CONTENT_TYPE_TEXT, ALIPAY_FAIL)
    }

    fn build_payment_request(&self, order: &Order) -> PaymentRequest {
        let mut params = BTreeMap::new();
        params.insert("app_id".to_string(), self.app_id.clone());
        params.insert("method".to_string(), PAGE_PAY_METHOD.to_string());
        params.insert("charset".to_string(), "utf-8".to_string());
        params.insert("out_trade_no".to_string(), order.no.as_str().to_string());
        params.insert("total_amount".to_string(), order.total_amount.to_string());
        params.insert("subject".to_string(), format!("Payment for order {}", order.no.as_str()));
        self.sign(&mut params);
        PaymentRequest { method: PaymentMethod::Alipay, order_no: order.no.clone(), params }
    }
}
