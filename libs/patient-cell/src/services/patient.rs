use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{CreatePatientRequest, Patient, PatientError, UpdatePatientRequest};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Creating new patient profile for: {}", request.email);

        if request.name.trim().is_empty() {
            return Err(PatientError::Validation("name must not be empty".to_string()));
        }
        if !request.privacy_consent {
            return Err(PatientError::Validation(
                "privacy_consent must be accepted".to_string(),
            ));
        }

        let existing_check_path = format!(
            "/rest/v1/patients?email=eq.{}&select=id",
            urlencoding::encode(&request.email)
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_check_path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        if !existing.is_empty() {
            return Err(PatientError::DuplicateEmail);
        }

        let now = Utc::now();
        let patient_data = json!({
            "name": request.name,
            "email": request.email,
            "phone": request.phone,
            "date_of_birth": request.date_of_birth.format("%Y-%m-%d").to_string(),
            "gender": request.gender,
            "address": request.address,
            "occupation": request.occupation,
            "emergency_contact_name": request.emergency_contact_name,
            "emergency_contact_number": request.emergency_contact_number,
            "primary_physician": request.primary_physician,
            "insurance_provider": request.insurance_provider,
            "insurance_policy_number": request.insurance_policy_number,
            "allergies": request.allergies,
            "current_medication": request.current_medication,
            "family_medical_history": request.family_medical_history,
            "past_medical_history": request.past_medical_history,
            "identification_type": request.identification_type,
            "identification_number": request.identification_number,
            "identification_document_url": request.identification_document_url,
            "privacy_consent": request.privacy_consent,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                Some(auth_token),
                Some(patient_data),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                shared_database::DbError::Conflict(_) => PatientError::DuplicateEmail,
                other => PatientError::Database(other.to_string()),
            })?;

        let patient = parse_patient_row(result)?;
        debug!("Patient profile created with ID: {}", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(PatientError::NotFound);
        }

        parse_patient_row(result)
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient profile: {}", patient_id);

        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.name {
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(occupation) = request.occupation {
            update_data.insert("occupation".to_string(), json!(occupation));
        }
        if let Some(name) = request.emergency_contact_name {
            update_data.insert("emergency_contact_name".to_string(), json!(name));
        }
        if let Some(number) = request.emergency_contact_number {
            update_data.insert("emergency_contact_number".to_string(), json!(number));
        }
        if let Some(physician) = request.primary_physician {
            update_data.insert("primary_physician".to_string(), json!(physician));
        }
        if let Some(provider) = request.insurance_provider {
            update_data.insert("insurance_provider".to_string(), json!(provider));
        }
        if let Some(policy) = request.insurance_policy_number {
            update_data.insert("insurance_policy_number".to_string(), json!(policy));
        }
        if let Some(allergies) = request.allergies {
            update_data.insert("allergies".to_string(), json!(allergies));
        }
        if let Some(medication) = request.current_medication {
            update_data.insert("current_medication".to_string(), json!(medication));
        }
        if let Some(history) = request.family_medical_history {
            update_data.insert("family_medical_history".to_string(), json!(history));
        }
        if let Some(history) = request.past_medical_history {
            update_data.insert("past_medical_history".to_string(), json!(history));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(headers),
            )
            .await
            .map_err(|e| PatientError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(PatientError::NotFound);
        }

        parse_patient_row(result)
    }
}

fn parse_patient_row(mut rows: Vec<Value>) -> Result<Patient, PatientError> {
    let row = rows
        .pop()
        .ok_or_else(|| PatientError::Database("Empty patient response".to_string()))?;

    serde_json::from_value(row)
        .map_err(|e| PatientError::Database(format!("Failed to parse patient: {}", e)))
}
