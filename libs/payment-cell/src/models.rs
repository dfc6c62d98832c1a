use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_models::error::AppError;

/// An order created at the gateway. `amount` is in the smallest currency unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentOrder {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Identity prefilled into the checkout form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Payer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub contact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutTheme {
    pub color: String,
}

/// Everything the client checkout widget needs to open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutOptions {
    pub key: String,
    pub amount: u64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    pub prefill: Payer,
    pub notes: Value,
    pub theme: CheckoutTheme,
}

/// Evidence returned by a successful checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentConfirmation {
    #[serde(alias = "razorpay_order_id")]
    pub order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The payer closed the checkout.
    Cancelled,
    /// The gateway declined the payment.
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentFailure {
    pub reason: FailureReason,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded(PaymentConfirmation),
    Failed(PaymentFailure),
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Order creation failed: {0}")]
    OrderCreation(String),

    #[error("Payment signature verification failed")]
    InvalidSignature,

    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::OrderCreation(_) => AppError::ExternalService(err.to_string()),
            PaymentError::InvalidSignature => AppError::BadRequest(err.to_string()),
            PaymentError::Unavailable(_) => AppError::ServiceUnavailable(err.to_string()),
        }
    }
}
