use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use availability_cell::models::hhmm;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_name: String,
    /// Local wall-clock date and time of the booked slot. No timezone or DST
    /// adjustment is applied.
    pub schedule: NaiveDateTime,
    pub reason: String,
    pub status: AppointmentStatus,
    pub note: Option<String>,
    pub cancellation_reason: Option<String>,
    /// AI triage side channel; the booking logic never reads this.
    pub triage: Option<Value>,
    pub video_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    Cancelled,
}

impl AppointmentStatus {
    /// Whether an appointment in this status keeps its slot occupied.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_name: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub patient_id: Uuid,
    pub reason: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub cancellation_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableDay {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub available_slot_count: usize,
}

/// `has_availability = false` means the doctor publishes no windows anywhere
/// in the horizon, which is a different signal than every slot being booked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableDatesResponse {
    pub doctor_name: String,
    pub has_availability: bool,
    pub dates: Vec<AvailableDay>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotResponse {
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub formatted_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentSearchQuery {
    pub status: Option<AppointmentStatus>,
    pub doctor_name: Option<String>,
    pub patient_id: Option<Uuid>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentStatusCounts {
    pub pending: i64,
    pub scheduled: i64,
    pub cancelled: i64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Slot already booked")]
    SlotTaken,

    #[error("Doctor not available at the requested time")]
    DoctorNotAvailable,

    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Appointment cannot change status from {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::SlotTaken => {
                AppError::Conflict("Slot already booked, please pick another slot".to_string())
            }
            AppointmentError::DoctorNotAvailable => {
                AppError::Conflict("Doctor not available at the requested time".to_string())
            }
            AppointmentError::NotFound => {
                AppError::NotFound("Appointment not found".to_string())
            }
            AppointmentError::PatientNotFound => {
                AppError::NotFound("Patient not found".to_string())
            }
            AppointmentError::InvalidStatusTransition(status) => AppError::Conflict(format!(
                "Appointment cannot change status from {}",
                status
            )),
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::Database(msg) => AppError::Database(msg),
        }
    }
}
