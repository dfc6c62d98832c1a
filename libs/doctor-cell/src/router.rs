use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_database::DocumentStore;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub struct DoctorState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
}

pub fn doctor_routes(state: Arc<DoctorState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/available", get(handlers::list_available_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/slots", get(handlers::get_available_slots))
        .route("/{doctor_id}/slots/{slot}", get(handlers::get_slot_status));

    let protected_routes = Router::new()
        .route("/{doctor_id}/slots/{slot}/reset", post(handlers::reset_slot))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
