use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::{
    CheckoutOptions, CheckoutTheme, Payer, PaymentConfirmation, PaymentError, PaymentOrder,
};
use crate::services::gateway::PaymentGateway;

type HmacSha256 = Hmac<Sha256>;

const MERCHANT_NAME: &str = "Ongogenesis";
const CHECKOUT_DESCRIPTION: &str = "Doctor Appointment Booking";
const THEME_COLOR: &str = "#667eea";

/// Razorpay Orders API and checkout signature verification.
///
/// Without API keys the gateway runs in test mode: orders are minted locally
/// and signatures are not checked.
pub struct RazorpayGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.razorpay_base_url.trim_end_matches('/').to_string(),
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
        }
    }

    pub fn is_test_mode(&self) -> bool {
        self.key_id.is_empty() || self.key_secret.is_empty()
    }

    fn expected_signature(&self, order_id: &str, payment_id: &str) -> Result<HmacSha256, PaymentError> {
        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes())
            .map_err(|_| PaymentError::InvalidSignature)?;
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        Ok(mac)
    }
}

fn gateway_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/description")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(
        &self,
        amount: u64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<PaymentOrder, PaymentError> {
        if self.is_test_mode() {
            let order = PaymentOrder {
                id: format!("order_test_{}", Utc::now().timestamp_millis()),
                amount,
                currency: currency.to_string(),
                receipt: Some(receipt.to_string()),
                status: Some("created".to_string()),
            };
            warn!("Razorpay keys missing; created local test order {}", order.id);
            return Ok(order);
        }

        let url = format!("{}/v1/orders", self.base_url);
        debug!("Creating Razorpay order for receipt {}", receipt);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&json!({
                "amount": amount,
                "currency": currency,
                "receipt": receipt,
                "notes": notes,
            }))
            .send()
            .await
            .map_err(|e| PaymentError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = gateway_message(&body);
            error!("Razorpay order creation failed ({}): {}", status, message);
            return Err(if status.is_server_error() {
                PaymentError::Unavailable(message)
            } else {
                PaymentError::OrderCreation(message)
            });
        }

        let order: PaymentOrder = response
            .json()
            .await
            .map_err(|e| PaymentError::OrderCreation(format!("Malformed order response: {}", e)))?;

        info!("Created Razorpay order {} for receipt {}", order.id, receipt);
        Ok(order)
    }

    fn verify_payment(&self, confirmation: &PaymentConfirmation) -> Result<(), PaymentError> {
        if self.is_test_mode() {
            warn!(
                "Razorpay keys missing; accepting payment {} without signature check",
                confirmation.payment_id
            );
            return Ok(());
        }

        let signature =
            hex::decode(&confirmation.signature).map_err(|_| PaymentError::InvalidSignature)?;

        self.expected_signature(&confirmation.order_id, &confirmation.payment_id)?
            .verify_slice(&signature)
            .map_err(|_| {
                warn!(
                    "Signature mismatch for order {} payment {}",
                    confirmation.order_id, confirmation.payment_id
                );
                PaymentError::InvalidSignature
            })
    }

    fn checkout_options(&self, order: &PaymentOrder, payer: &Payer, notes: Value) -> CheckoutOptions {
        CheckoutOptions {
            key: self.key_id.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            name: MERCHANT_NAME.to_string(),
            description: CHECKOUT_DESCRIPTION.to_string(),
            order_id: order.id.clone(),
            prefill: payer.clone(),
            notes,
            theme: CheckoutTheme {
                color: THEME_COLOR.to_string(),
            },
        }
    }
}
