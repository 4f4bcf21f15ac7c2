use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // Slot discovery is public; everything that touches records requires auth
    let public_routes = Router::new()
        .route("/available-dates", get(handlers::get_available_dates))
        .route("/available-slots", get(handlers::get_available_slots));

    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/", get(handlers::list_appointments))
        .route("/counts", get(handlers::appointment_counts))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/schedule", patch(handlers::schedule_appointment))
        .route("/{appointment_id}/cancel", patch(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
