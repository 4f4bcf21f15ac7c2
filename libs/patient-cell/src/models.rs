use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_number: Option<String>,
    pub primary_physician: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_policy_number: Option<String>,
    pub allergies: Option<String>,
    pub current_medication: Option<String>,
    pub family_medical_history: Option<String>,
    pub past_medical_history: Option<String>,
    pub identification_type: Option<String>,
    pub identification_number: Option<String>,
    // Upload handling lives elsewhere; this is an opaque storage reference
    pub identification_document_url: Option<String>,
    pub privacy_consent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_number: Option<String>,
    pub primary_physician: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_policy_number: Option<String>,
    pub allergies: Option<String>,
    pub current_medication: Option<String>,
    pub family_medical_history: Option<String>,
    pub past_medical_history: Option<String>,
    pub identification_type: Option<String>,
    pub identification_number: Option<String>,
    pub identification_document_url: Option<String>,
    pub privacy_consent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_number: Option<String>,
    pub primary_physician: Option<String>,
    pub insurance_provider: Option<String>,
    pub insurance_policy_number: Option<String>,
    pub allergies: Option<String>,
    pub current_medication: Option<String>,
    pub family_medical_history: Option<String>,
    pub past_medical_history: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PatientError {
    #[error("Patient with this email already exists")]
    DuplicateEmail,

    #[error("Patient not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::DuplicateEmail => {
                AppError::Conflict("Patient with this email already exists".to_string())
            }
            PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
            PatientError::Validation(msg) => AppError::ValidationError(msg),
            PatientError::Database(msg) => AppError::Database(msg),
        }
    }
}
