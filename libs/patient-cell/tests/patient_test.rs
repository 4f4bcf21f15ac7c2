use chrono::{NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::models::{CreatePatientRequest, PatientError};
use patient_cell::services::patient::PatientService;
use shared_utils::test_utils::TestConfig;

const TOKEN: &str = "test-token";

fn service_for(server: &MockServer) -> PatientService {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    PatientService::new(&config)
}

fn create_request(email: &str) -> CreatePatientRequest {
    CreatePatientRequest {
        name: "Rosa Quinn".to_string(),
        email: email.to_string(),
        phone: "+353851234567".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1991, 4, 12).unwrap(),
        gender: Some("female".to_string()),
        address: None,
        occupation: None,
        emergency_contact_name: None,
        emergency_contact_number: None,
        primary_physician: Some("Dr. Leila Hart".to_string()),
        insurance_provider: Some("VHI".to_string()),
        insurance_policy_number: Some("VH-204381".to_string()),
        allergies: None,
        current_medication: None,
        family_medical_history: None,
        past_medical_history: None,
        identification_type: Some("passport".to_string()),
        identification_number: None,
        identification_document_url: None,
        privacy_consent: true,
    }
}

fn patient_row(id: Uuid, email: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": "Rosa Quinn",
        "email": email,
        "phone": "+353851234567",
        "date_of_birth": "1991-04-12",
        "gender": "female",
        "address": null,
        "occupation": null,
        "emergency_contact_name": null,
        "emergency_contact_number": null,
        "primary_physician": "Dr. Leila Hart",
        "insurance_provider": "VHI",
        "insurance_policy_number": "VH-204381",
        "allergies": null,
        "current_medication": null,
        "family_medical_history": null,
        "past_medical_history": null,
        "identification_type": "passport",
        "identification_number": null,
        "identification_document_url": null,
        "privacy_consent": true,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

#[tokio::test]
async fn registration_creates_a_profile() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            patient_row(patient_id, "rosa.quinn@example.com")
        ])))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let patient = service
        .create_patient(create_request("rosa.quinn@example.com"), TOKEN)
        .await
        .unwrap();

    assert_eq!(patient.id, patient_id);
    assert_eq!(patient.email, "rosa.quinn@example.com");
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4() }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .create_patient(create_request("rosa.quinn@example.com"), TOKEN)
        .await
        .unwrap_err();

    assert!(matches!(err, PatientError::DuplicateEmail));
}

#[tokio::test]
async fn registration_requires_privacy_consent() {
    let server = MockServer::start().await;

    let service = service_for(&server);
    let mut request = create_request("rosa.quinn@example.com");
    request.privacy_consent = false;

    let err = service.create_patient(request, TOKEN).await.unwrap_err();
    assert!(matches!(err, PatientError::Validation(_)));
}

#[tokio::test]
async fn unknown_patient_is_not_found() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .get_patient(&patient_id.to_string(), TOKEN)
        .await
        .unwrap_err();

    assert!(matches!(err, PatientError::NotFound));
}
