use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentState};
use auth_cell::{auth_routes, AuthState};
use classification_cell::{classification_routes, ClassificationState};
use doctor_cell::{doctor_routes, DoctorState};
use shared_config::AppConfig;
use shared_database::DocumentStore;

pub fn create_router(config: Arc<AppConfig>, store: Arc<dyn DocumentStore>) -> Router {
    let auth_state = Arc::new(AuthState::new(Arc::clone(&config), Arc::clone(&store)));
    let doctor_state = Arc::new(DoctorState {
        config: Arc::clone(&config),
        store: Arc::clone(&store),
    });
    let appointment_state = Arc::new(AppointmentState::new(Arc::clone(&config), Arc::clone(&store)));
    let classification_state = Arc::new(ClassificationState {
        config,
        store,
    });

    Router::new()
        .route("/", get(|| async { "Ongogenesis API is running!" }))
        .nest("/auth", auth_routes(auth_state))
        .nest("/doctors", doctor_routes(doctor_state))
        .nest("/appointments", appointment_routes(appointment_state))
        .nest("/classification", classification_routes(classification_state))
}
