//! # Payment gateway clients
//!
//! Each provider gets a client that knows how to check the authenticity of the provider's notifications, translate
//! them into a [`NormalizedNotification`], and build the acknowledgement the provider expects in return.
//!
//! The reconciler only ever talks to the [`GatewayClient`] and [`RefundGatewayClient`] traits. Clients are plain
//! values, configured once at start-up and handed to the reconciler on each call.
mod alipay;
pub mod signature;
mod wechat;

use std::collections::BTreeMap;

pub use alipay::AlipayClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shop_common::Money;
use thiserror::Error;
pub use wechat::WechatClient;

use crate::db_types::{Order, OrderNo, PaymentMethod};

pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
pub const CONTENT_TYPE_JSON: &str = "application/json";

//--------------------------------------   RawNotification    ---------------------------------------------------------
/// The flat set of key/value parameters a provider sent us, before any verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNotification(BTreeMap<String, String>);

impl RawNotification {
    pub fn new(params: BTreeMap<String, String>) -> Self {
        Self(params)
    }

    /// Flattens a JSON object into notification parameters. Scalars are stringified, `null`s are dropped and nested
    /// values are kept as their compact JSON text.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let params = obj
            .iter()
            .filter_map(|(k, v)| {
                let v = match v {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    other => other.to_string(),
                };
                Some((k.clone(), v))
            })
            .collect();
        Some(Self(params))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Like [`Self::get`], but treats an empty value as missing and reports it as a verification error.
    pub fn require(&self, key: &'static str) -> Result<&str, VerificationError> {
        self.get(key).filter(|v| !v.is_empty()).ok_or(VerificationError::MissingField(key))
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawNotification {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

//--------------------------------------  Normalized payloads  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationStatus {
    Succeeded,
    Refunded,
    /// Any other provider status. The raw code is kept for logging.
    Other(String),
}

/// A verified payment notification, in provider-neutral terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedNotification {
    pub order_no: OrderNo,
    /// The provider-side transaction id (`trade_no` / `transaction_id`).
    pub transaction_id: String,
    pub status: NotificationStatus,
    /// The amount the provider reports as paid, when the notification carries one.
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundResult {
    Success,
    /// Anything other than success. Holds the provider's raw refund status code.
    Failed(String),
}

/// A verified refund-result notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundNotification {
    pub order_no: OrderNo,
    pub refund_no: Option<String>,
    pub result: RefundResult,
}

//--------------------------------------          Ack          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Success,
    Failure,
}

/// The response a provider expects after delivering a notification. Success stops the provider's retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub outcome: AckOutcome,
    pub status_code: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Ack {
    pub fn success(status_code: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self { outcome: AckOutcome::Success, status_code, content_type, body: body.into() }
    }

    pub fn failure(status_code: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self { outcome: AckOutcome::Failure, status_code, content_type, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AckOutcome::Success
    }
}

//--------------------------------------    PaymentRequest     ---------------------------------------------------------
/// A signed set of parameters that a buyer's browser (Alipay) or QR code (WeChat) forwards to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub order_no: OrderNo,
    pub params: BTreeMap<String, String>,
}

//--------------------------------------   VerificationError   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("The notification is not signed")]
    MissingSignature,
    #[error("The notification signature is not valid base64")]
    MalformedSignature,
    #[error("The notification signature does not match its content")]
    InvalidSignature,
    #[error("Unsupported signature type: {0}")]
    UnsupportedSignType(String),
    #[error("The notification is missing the required field '{0}'")]
    MissingField(&'static str),
    #[error("The notification field '{field}' has an invalid value: {value}")]
    InvalidField { field: &'static str, value: String },
    #[error("The notification was addressed to a different merchant account: {0}")]
    AccountMismatch(String),
}

//--------------------------------------        Traits         ---------------------------------------------------------
/// The contract every payment provider client fulfils for payment notifications.
pub trait GatewayClient {
    /// The payment method recorded on orders paid through this gateway.
    fn payment_method(&self) -> PaymentMethod;

    /// Checks the notification's authenticity and translates it into provider-neutral terms.
    fn verify(&self, raw: &RawNotification) -> Result<NormalizedNotification, VerificationError>;

    fn success_ack(&self) -> Ack;

    fn failure_ack(&self, reason: &str) -> Ack;

    /// Builds the signed parameters the provider needs to start a payment for `order`.
    fn build_payment_request(&self, order: &Order) -> PaymentRequest;
}

/// Providers that also call back with refund results. Refund callbacks use their own signature scheme and their own
/// failure body.
pub trait RefundGatewayClient {
    fn verify_refund(&self, raw: &RawNotification) -> Result<RefundNotification, VerificationError>;

    fn refund_success_ack(&self) -> Ack;

    fn refund_failure_ack(&self) -> Ack;
}
