// Handler-level authorization checks; these fail before any store access.

use axum::extract::{Extension, State};
use axum::Json;
use axum_extra::TypedHeader;
use chrono::{NaiveDate, NaiveTime};
use headers::{authorization::Bearer, Authorization};
use uuid::Uuid;

use appointment_cell::handlers;
use appointment_cell::models::BookAppointmentRequest;
use shared_models::error::AppError;
use shared_utils::test_utils::{TestConfig, TestUser};

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer("test-token").unwrap())
}

#[tokio::test]
async fn booking_for_another_patient_is_rejected() {
    let state = TestConfig::default().to_arc();
    let user = TestUser::patient("rosa.quinn@example.com").to_user();

    let request = BookAppointmentRequest {
        doctor_name: "Dr. Leila Hart".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
        time: NaiveTime::parse_from_str("09:00", "%H:%M").unwrap(),
        patient_id: Uuid::new_v4(), // someone else
        reason: "Persistent cough".to_string(),
        note: None,
    };

    let result =
        handlers::book_appointment(State(state), auth_header(), Extension(user), Json(request))
            .await;

    assert!(matches!(result, Err(AppError::Auth(_))));
}

#[tokio::test]
async fn listing_appointments_requires_admin() {
    let state = TestConfig::default().to_arc();
    let user = TestUser::patient("rosa.quinn@example.com").to_user();

    let result = handlers::list_appointments(
        State(state),
        axum::extract::Query(Default::default()),
        auth_header(),
        Extension(user),
    )
    .await;

    assert!(matches!(result, Err(AppError::Auth(_))));
}
