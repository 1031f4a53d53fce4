use std::collections::BTreeMap;

use log::*;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;
use shop_common::{Money, Secret};

use super::{
    signature::{calculate_hmac, canonical_string, derive_key, verify_hmac, SIGN_KEY},
    Ack,
    GatewayClient,
    NormalizedNotification,
    NotificationStatus,
    PaymentRequest,
    RawNotification,
    RefundGatewayClient,
    RefundNotification,
    RefundResult,
    VerificationError,
    CONTENT_TYPE_JSON,
};
use crate::db_types::{Order, OrderNo, PaymentMethod};

const NATIVE_TRADE_TYPE: &str = "NATIVE";
const NONCE_LENGTH: usize = 32;

/// Client for WeChat Pay native (QR code) payments.
///
/// Payment notifications are signed over the canonical parameter string with `&key=<api key>` appended. Refund
/// notifications are signed with a key derived from the API key, so a payment signature can never pass as a refund
/// signature or vice versa.
#[derive(Debug, Clone)]
pub struct WechatClient {
    app_id: String,
    mch_id: String,
    api_key: Secret<String>,
}

impl WechatClient {
    pub fn new<S: Into<String>>(app_id: S, mch_id: S, api_key: Secret<String>) -> Self {
        Self { app_id: app_id.into(), mch_id: mch_id.into(), api_key }
    }

    fn payment_message(&self, params: &BTreeMap<String, String>) -> String {
        format!("{}&key={}", canonical_string(params), self.api_key.reveal())
    }

    fn refund_key(&self) -> Vec<u8> {
        derive_key(self.api_key.reveal())
    }

    /// Signs payment parameters in place.
    pub fn sign(&self, params: &mut BTreeMap<String, String>) {
        let sig = calculate_hmac(self.api_key.reveal().as_bytes(), &self.payment_message(params));
        params.insert(SIGN_KEY.into(), sig);
    }

    /// Signs refund-result parameters in place.
    pub fn sign_refund(&self, params: &mut BTreeMap<String, String>) {
        let sig = calculate_hmac(&self.refund_key(), &canonical_string(params));
        params.insert(SIGN_KEY.into(), sig);
    }

    fn signature(raw: &RawNotification) -> Result<&str, VerificationError> {
        raw.get(SIGN_KEY).filter(|s| !s.is_empty()).ok_or(VerificationError::MissingSignature)
    }

    fn check_merchant(&self, raw: &RawNotification) -> Result<(), VerificationError> {
        if let Some(app_id) = raw.get("appid").filter(|a| *a != self.app_id) {
            return Err(VerificationError::AccountMismatch(app_id.to_string()));
        }
        if let Some(mch_id) = raw.get("mch_id").filter(|m| *m != self.mch_id) {
            return Err(VerificationError::AccountMismatch(mch_id.to_string()));
        }
        Ok(())
    }

    fn status_from_code(code: &str) -> NotificationStatus {
        match code {
            "SUCCESS" => NotificationStatus::Succeeded,
            "REFUND" => NotificationStatus::Refunded,
            other => NotificationStatus::Other(other.to_string()),
        }
    }

    fn nonce() -> String {
        rand::thread_rng().sample_iter(&Alphanumeric).take(NONCE_LENGTH).map(char::from).collect()
    }
}

impl GatewayClient for WechatClient {
    fn payment_method(&self) -> PaymentMethod {
        PaymentMethod::Wechat
    }

    fn verify(&self, raw: &RawNotification) -> Result<NormalizedNotification, VerificationError> {
        let sig = Self::signature(raw)?;
        verify_hmac(self.api_key.reveal().as_bytes(), &self.payment_message(raw.params()), sig)?;
        self.check_merchant(raw)?;
        let order_no = OrderNo::from(raw.require("out_trade_no")?);
        let transaction_id = raw.require("transaction_id")?.to_string();
        let status = Self::status_from_code(raw.require("result_code")?);
        let amount = match raw.get("total_fee").filter(|s| !s.is_empty()) {
            Some(fee) => {
                let cents = fee
                    .parse::<i64>()
                    .map_err(|_| VerificationError::InvalidField { field: "total_fee", value: fee.to_string() })?;
                Some(Money::from_cents(cents))
            },
            None => None,
        };
        trace!("💳️ WeChat notification for {order_no} verified. Status: {status:?}");
        Ok(NormalizedNotification { order_no, transaction_id, status, amount })
    }

    fn success_ack(&self) -> Ack {
        Ack::success(200, CONTENT_TYPE_JSON, json!({"code": "SUCCESS", "message": "OK"}).to_string())
    }

    fn failure_ack(&self, reason: &str) -> Ack {
        Ack::failure(500, CONTENT_TYPE_JSON, json!({"code": "FAIL", "message": reason}).to_string())
    }

    fn build_payment_request(&self, order: &Order) -> PaymentRequest {
        let mut params = BTreeMap::new();
        params.insert("appid".to_string(), self.app_id.clone());
        params.insert("mch_id".to_string(), self.mch_id.clone());
        params.insert("nonce_str".to_string(), Self::nonce());
        params.insert("out_trade_no".to_string(), order.no.as_str().to_string());
        params.insert("total_fee".to_string(), order.total_amount.cents().to_string());
        params.insert("body".to_string(), format!("Payment for order {}", order.no.as_str()));
        params.insert("trade_type".to_string(), NATIVE_TRADE_TYPE.to_string());
        self.sign(&mut params);
        PaymentRequest { method: PaymentMethod::Wechat, order_no: order.no.clone(), params }
    }
}

impl RefundGatewayClient for WechatClient {
    fn verify_refund(&self, raw: &RawNotification) -> Result<RefundNotification, VerificationError> {
        let sig = Self::signature(raw)?;
        verify_hmac(&self.refund_key(), &canonical_string(raw.params()), sig)?;
        self.check_merchant(raw)?;
        let order_no = OrderNo::from(raw.require("out_trade_no")?);
        let refund_no = raw.get("out_refund_no").filter(|s| !s.is_empty()).map(String::from);
        let result = match raw.require("refund_status")? {
            "SUCCESS" => RefundResult::Success,
            code => RefundResult::Failed(code.to_string()),
        };
        trace!("💳️ WeChat refund notification for {order_no} verified. Result: {result:?}");
        Ok(RefundNotification { order_no, refund_no, result })
    }

    fn refund_success_ack(&self) -> Ack {
        self.success_ack()
    }

    /// WeChat requires this exact body when a refund callback cannot be processed.
    fn refund_failure_ack(&self) -> Ack {
        Ack::failure(500, CONTENT_TYPE_JSON, json!({"code": "FAIL", "message": "FAIL"}).to_string())
    }
}
