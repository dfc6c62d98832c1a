// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use payment_cell::{PaymentGateway, RazorpayGateway};
use shared_config::AppConfig;
use shared_database::DocumentStore;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl AppointmentState {
    /// Razorpay-backed state; test mode when the keys are missing.
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn DocumentStore>) -> Self {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::new(&config));
        Self::with_gateway(config, store, gateway)
    }

    pub fn with_gateway(
        config: Arc<AppConfig>,
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            config,
            store,
            gateway,
        }
    }
}

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    // Every appointment operation requires authentication
    let protected_routes = Router::new()
        .route("/book", post(handlers::book_appointment))
        .route("/booked", get(handlers::get_booked_appointments))
        .route("/patient", get(handlers::get_patient_appointments))
        .route("/doctor", get(handlers::get_doctor_appointments))
        .route("/incidents", get(handlers::list_incidents))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_status))
        .route("/{appointment_id}/meeting", get(handlers::get_meeting_link))
        .route("/{appointment_id}/payment/confirm", post(handlers::confirm_payment))
        .route("/{appointment_id}/payment/failure", post(handlers::record_payment_failure))
        .route("/{appointment_id}/retry-commit", post(handlers::retry_commit))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new().merge(protected_routes).with_state(state)
}
