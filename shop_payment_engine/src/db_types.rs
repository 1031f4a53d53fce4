use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shop_common::Money;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

/// The key under which a provider's raw refund result is recorded in [`Order::extra`] when a refund fails.
pub const REFUND_FAILED_CODE_KEY: &str = "refund_failed_code";

/// Free-form diagnostic data attached to an order.
pub type OrderExtra = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderNo        ---------------------------------------------------------
/// The externally visible order number. This is the identifier shared with the payment gateways (`out_trade_no`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderNo(pub String);

impl FromStr for OrderNo {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNo {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNo {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderNo {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Alipay. Redirect-based web payments.
    Alipay,
    /// WeChat Pay. QR code (native) payments.
    Wechat,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Alipay => write!(f, "alipay"),
            PaymentMethod::Wechat => write!(f, "wechat"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alipay" => Ok(Self::Alipay),
            "wechat" | "wechatpay" => Ok(Self::Wechat),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------     RefundStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    /// No refund has been requested for the order.
    #[default]
    Pending,
    /// A refund has been submitted to the payment provider and the result is outstanding.
    Processing,
    /// The provider reported that the refund completed.
    Success,
    /// The provider reported that the refund did not complete.
    Failed,
}

impl RefundStatus {
    /// True once the provider has reported a final result for the refund.
    pub fn is_resolved(&self) -> bool {
        matches!(self, RefundStatus::Success | RefundStatus::Failed)
    }
}

impl Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundStatus::Pending => write!(f, "pending"),
            RefundStatus::Processing => write!(f, "processing"),
            RefundStatus::Success => write!(f, "success"),
            RefundStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RefundStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid refund status: {s}"))),
        }
    }
}

impl From<String> for RefundStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid refund status: {value}. But this conversion cannot fail. Defaulting to Pending");
            RefundStatus::Pending
        })
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub no: OrderNo,
    pub total_amount: Money,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_no: Option<String>,
    pub closed: bool,
    pub refund_status: RefundStatus,
    pub extra: Json<OrderExtra>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }

    /// An order can still take a payment if it has not been paid and has not been closed.
    pub fn is_payable(&self) -> bool {
        !self.is_paid() && !self.closed
    }

    pub fn extra_value(&self, key: &str) -> Option<&Value> {
        self.extra.0.get(key)
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Order {} [{}] total: {} ", self.no, self.id, self.total_amount)?;
        match (&self.paid_at, &self.payment_method) {
            (Some(at), Some(method)) => write!(f, "paid via {method} at {at}")?,
            (Some(at), None) => write!(f, "paid at {at}")?,
            (None, _) if self.closed => write!(f, "closed")?,
            (None, _) => write!(f, "unpaid")?,
        }
        write!(f, " refund: {}", self.refund_status)
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub no: OrderNo,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(no: OrderNo, total_amount: Money) -> Self {
        Self { no, total_amount, created_at: Utc::now() }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

//--------------------------------------      PaidUpdate       ---------------------------------------------------------
/// The fields that are written, together and exactly once, when an order is paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidUpdate {
    pub paid_at: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub payment_no: String,
}

impl PaidUpdate {
    pub fn now(payment_method: PaymentMethod, payment_no: String) -> Self {
        Self { paid_at: Utc::now(), payment_method, payment_no }
    }
}

/// The result of a conditional (`paid_at IS NULL`) update.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalUpdate {
    /// The update was applied. Contains the updated order.
    Applied(Order),
    /// The guard failed, so nothing was written. Contains the order as it is currently stored.
    AlreadyApplied(Order),
}

//--------------------------------------      OrderUpdate      ---------------------------------------------------------
/// A plain (unguarded) partial update. Only the `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub refund_status: Option<RefundStatus>,
    pub extra: Option<OrderExtra>,
    pub closed: Option<bool>,
}

impl OrderUpdate {
    pub fn with_refund_status(mut self, status: RefundStatus) -> Self {
        self.refund_status = Some(status);
        self
    }

    pub fn with_extra(mut self, extra: OrderExtra) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn with_closed(mut self, closed: bool) -> Self {
        self.closed = Some(closed);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.refund_status.is_none() && self.extra.is_none() && self.closed.is_none()
    }
}
