use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    // Every availability mutation is an administrative action
    Router::new()
        .route("/", post(handlers::create_availability))
        .route("/", get(handlers::list_availability))
        .route("/{availability_id}", put(handlers::update_availability))
        .route("/{availability_id}", delete(handlers::delete_availability))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
