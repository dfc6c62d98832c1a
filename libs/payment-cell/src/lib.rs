pub mod models;
pub mod services;

pub use models::{
    CheckoutOptions, CheckoutTheme, FailureReason, Payer, PaymentConfirmation, PaymentError,
    PaymentFailure, PaymentOrder, PaymentOutcome,
};
pub use services::gateway::{Checkout, PaymentGateway};
pub use services::orchestrator::PaymentOrchestrator;
pub use services::razorpay::RazorpayGateway;
