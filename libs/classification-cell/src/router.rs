use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_database::DocumentStore;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Room for a maximum-size image plus form overhead. Anything between this
/// and the image limit is refused by upload validation with a 413.
const UPLOAD_BODY_LIMIT: usize = 32 * 1024 * 1024;

pub struct ClassificationState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
}

pub fn classification_routes(state: Arc<ClassificationState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::service_health))
        .route("/models", get(handlers::list_models));

    let protected_routes = Router::new()
        .route("/classify", post(handlers::classify_image))
        .route("/history", get(handlers::get_history))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
