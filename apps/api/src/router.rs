use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use availability_cell::router::availability_routes;
use patient_cell::router::patient_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "TeleCare API is running!" }))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/availability", availability_routes(state.clone()))
        .nest("/appointments", appointment_routes(state))
}
