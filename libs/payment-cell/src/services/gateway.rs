use async_trait::async_trait;
use serde_json::Value;

use crate::models::{CheckoutOptions, Payer, PaymentConfirmation, PaymentError, PaymentOrder, PaymentOutcome};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates an order for `amount` in the smallest currency unit.
    async fn create_order(
        &self,
        amount: u64,
        currency: &str,
        receipt: &str,
        notes: Value,
    ) -> Result<PaymentOrder, PaymentError>;

    /// Checks the signature binding `order_id` to `payment_id`.
    fn verify_payment(&self, confirmation: &PaymentConfirmation) -> Result<(), PaymentError>;

    fn checkout_options(&self, order: &PaymentOrder, payer: &Payer, notes: Value) -> CheckoutOptions;
}

/// The payer-facing checkout. Resolves once the payer finishes or gives up.
#[async_trait]
pub trait Checkout: Send + Sync {
    async fn open(&self, options: &CheckoutOptions) -> PaymentOutcome;
}
