use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn patient_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_patient))
        .route("/{patient_id}", get(handlers::get_patient))
        .route("/{patient_id}", patch(handlers::update_patient))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
