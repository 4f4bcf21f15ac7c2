use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{Local, NaiveDate};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentSearchQuery, BookAppointmentRequest, CancelAppointmentRequest,
};
use crate::services::booking::{BookingService, DEFAULT_HORIZON_DAYS};

#[derive(Debug, Deserialize)]
pub struct AvailableDatesQuery {
    pub doctor_name: String,
    pub horizon_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub doctor_name: String,
    pub date: NaiveDate,
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_dates(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AvailableDatesQuery>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);

    let horizon = query.horizon_days.unwrap_or(DEFAULT_HORIZON_DAYS).clamp(1, 90);
    let from = Local::now().date_naive();

    let response = service
        .get_available_dates(&query.doctor_name, from, horizon, None)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);

    let slots = service
        .get_available_slots(&query.doctor_name, query.date, None)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "doctor_name": query.doctor_name,
        "date": query.date,
        "slots": slots
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    // Patients book for themselves; admins may book on a patient's behalf
    if !user.is_admin() && user.id != request.patient_id.to_string() {
        return Err(AppError::Auth(
            "Not authorized to book for this patient".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let appointment = service
        .book_appointment(request, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(AppError::from)?;

    if !user.is_admin() && user.id != appointment.patient_id.to_string() {
        return Err(AppError::Auth(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AppointmentSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can list appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let appointments = service
        .search_appointments(query, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn appointment_counts(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can view appointment counts".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let counts = service
        .status_counts(auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(counts)))
}

#[axum::debug_handler]
pub async fn schedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can approve appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let appointment = service
        .schedule_appointment(appointment_id, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);

    // Admins may cancel anything; a patient only their own appointment
    if !user.is_admin() {
        let appointment = service
            .get_appointment(appointment_id, auth.token())
            .await
            .map_err(AppError::from)?;

        if user.id != appointment.patient_id.to_string() {
            return Err(AppError::Auth(
                "Not authorized to cancel this appointment".to_string(),
            ));
        }
    }

    let appointment = service
        .cancel_appointment(appointment_id, request, auth.token())
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!(appointment)))
}
