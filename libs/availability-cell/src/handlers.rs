use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateAvailabilityRequest, UpdateAvailabilityRequest};
use crate::services::availability::AvailabilityService;

fn require_admin(user: &User) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can manage availability".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = AvailabilityService::new(&state);
    let windows = service
        .create_availability(request, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "windows": windows,
        "total": windows.len()
    })))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<AppConfig>>,
    Path(availability_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = AvailabilityService::new(&state);
    let window = service
        .update_availability(&availability_id, request, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppConfig>>,
    Path(availability_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = AvailabilityService::new(&state);
    service
        .soft_delete_availability(&availability_id, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn list_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = AvailabilityService::new(&state);
    let windows = service
        .list_active(auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "windows": windows,
        "total": windows.len()
    })))
}
