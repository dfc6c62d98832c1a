use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use shared_config::AppConfig;

use crate::models::{
    CheckoutOptions, FailureReason, Payer, PaymentConfirmation, PaymentError, PaymentFailure,
    PaymentOrder,
};
use crate::services::gateway::PaymentGateway;

/// Consultation payments: one fixed fee per appointment.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    fee: u64,
    currency: String,
}

impl PaymentOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, config: &AppConfig) -> Self {
        Self {
            gateway,
            fee: config.consultation_fee,
            currency: config.payment_currency.clone(),
        }
    }

    /// Fee in major units, e.g. rupees.
    pub fn consultation_fee(&self) -> u64 {
        self.fee
    }

    /// Creates the order for `appointment_id` and the matching checkout options.
    pub async fn initiate(
        &self,
        appointment_id: &str,
        payer: &Payer,
    ) -> Result<(PaymentOrder, CheckoutOptions), PaymentError> {
        let notes = json!({
            "appointment_id": appointment_id,
            "booking_type": "doctor_appointment",
        });

        let order = self
            .gateway
            .create_order(self.fee * 100, &self.currency, appointment_id, notes.clone())
            .await?;
        let checkout = self.gateway.checkout_options(&order, payer, notes);

        info!("Payment order {} initiated for {}", order.id, appointment_id);
        Ok((order, checkout))
    }

    pub fn confirm(&self, confirmation: &PaymentConfirmation) -> Result<(), PaymentError> {
        self.gateway.verify_payment(confirmation)
    }

    /// Logs a failed checkout and says whether the gateway declined it.
    pub fn record_failure(&self, appointment_id: &str, failure: &PaymentFailure) -> bool {
        let message = failure.message.as_deref().unwrap_or("no details");
        match failure.reason {
            FailureReason::Cancelled => {
                info!("Checkout for {} cancelled by payer: {}", appointment_id, message);
                false
            }
            FailureReason::Rejected => {
                warn!("Payment for {} rejected by gateway: {}", appointment_id, message);
                true
            }
        }
    }
}
