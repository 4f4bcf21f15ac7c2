// Handler-level authorization checks; these fail before any store access.

use axum::extract::{Extension, State};
use axum::Json;
use axum_extra::TypedHeader;
use chrono::NaiveTime;
use headers::{authorization::Bearer, Authorization};

use availability_cell::handlers;
use availability_cell::models::{CreateAvailabilityRequest, DayOfWeek};
use shared_models::error::AppError;
use shared_utils::test_utils::{TestConfig, TestUser};

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer("test-token").unwrap())
}

fn request() -> CreateAvailabilityRequest {
    CreateAvailabilityRequest {
        doctor_name: "Dr. Leila Hart".to_string(),
        days_of_week: vec![DayOfWeek::Monday],
        start_time: NaiveTime::parse_from_str("09:00", "%H:%M").unwrap(),
        end_time: NaiveTime::parse_from_str("17:00", "%H:%M").unwrap(),
        slot_duration_minutes: 30,
    }
}

#[tokio::test]
async fn non_admin_cannot_create_availability() {
    let state = TestConfig::default().to_arc();
    let user = TestUser::patient("rosa.quinn@example.com").to_user();

    let result = handlers::create_availability(
        State(state),
        auth_header(),
        Extension(user),
        Json(request()),
    )
    .await;

    assert!(matches!(result, Err(AppError::Auth(_))));
}

#[tokio::test]
async fn non_admin_cannot_list_availability() {
    let state = TestConfig::default().to_arc();
    let user = TestUser::patient("rosa.quinn@example.com").to_user();

    let result = handlers::list_availability(State(state), auth_header(), Extension(user)).await;

    assert!(matches!(result, Err(AppError::Auth(_))));
}
