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

use crate::models::{CreatePatientRequest, UpdatePatientRequest};
use crate::services::patient::PatientService;

fn authorize_patient_access(user: &User, patient_id: &str) -> Result<(), AppError> {
    if !user.is_admin() && user.id != patient_id {
        return Err(AppError::Auth(
            "Not authorized to access this patient profile".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);

    let patient = service
        .create_patient(request, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    authorize_patient_access(&user, &patient_id)?;

    let service = PatientService::new(&state);
    let patient = service
        .get_patient(&patient_id, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_patient_access(&user, &patient_id)?;

    let service = PatientService::new(&state);
    let patient = service
        .update_patient(&patient_id, request, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(patient)))
}
