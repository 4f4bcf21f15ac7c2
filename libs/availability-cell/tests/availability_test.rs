// Service-level tests against a mocked PostgREST backend.

use chrono::{NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use availability_cell::models::{
    AvailabilityError, CreateAvailabilityRequest, DayOfWeek, UpdateAvailabilityRequest,
};
use availability_cell::services::availability::AvailabilityService;
use shared_utils::test_utils::TestConfig;

const TOKEN: &str = "test-token";
const DOCTOR: &str = "Dr. Leila Hart";

fn service_for(server: &MockServer) -> AvailabilityService {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    AvailabilityService::new(&config)
}

fn window_row(id: Uuid, day_of_week: i32, start: &str, end: &str) -> serde_json::Value {
    json!({
        "id": id,
        "doctor_name": DOCTOR,
        "day_of_week": day_of_week,
        "start_time": start,
        "end_time": end,
        "slot_duration_minutes": 30,
        "is_active": true,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

fn create_request(days: Vec<DayOfWeek>, start: &str, end: &str, duration: i32) -> CreateAvailabilityRequest {
    CreateAvailabilityRequest {
        doctor_name: DOCTOR.to_string(),
        days_of_week: days,
        start_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
        end_time: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
        slot_duration_minutes: duration,
    }
}

#[tokio::test]
async fn create_rejects_partial_overlap() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            window_row(Uuid::new_v4(), 1, "09:00:00", "12:00:00")
        ])))
        .mount(&server)
        .await;

    // The batch must never reach the insert when validation fails
    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .create_availability(create_request(vec![DayOfWeek::Monday], "11:00", "14:00", 30), TOKEN)
        .await
        .unwrap_err();

    match err {
        AvailabilityError::Overlap(msg) => assert!(msg.contains("Monday")),
        other => panic!("expected overlap error, got {:?}", other),
    }
}

#[tokio::test]
async fn adjacent_windows_are_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            window_row(Uuid::new_v4(), 1, "09:00:00", "12:00:00")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            window_row(Uuid::new_v4(), 1, "12:00:00", "15:00:00")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let windows = service
        .create_availability(create_request(vec![DayOfWeek::Monday], "12:00", "15:00", 30), TOKEN)
        .await
        .unwrap();

    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].day_of_week, 1);
}

#[tokio::test]
async fn batch_fails_atomically_when_any_day_conflicts() {
    let server = MockServer::start().await;

    // Only Wednesday has an existing window; Monday would be fine on its own
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            window_row(Uuid::new_v4(), 3, "10:00:00", "11:00:00")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .create_availability(
            create_request(
                vec![DayOfWeek::Monday, DayOfWeek::Wednesday],
                "09:00",
                "12:00",
                30,
            ),
            TOKEN,
        )
        .await
        .unwrap_err();

    match err {
        AvailabilityError::Overlap(msg) => assert!(msg.contains("Wednesday")),
        other => panic!("expected overlap error, got {:?}", other),
    }
}

#[tokio::test]
async fn batch_creates_one_row_per_day() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            window_row(Uuid::new_v4(), 1, "09:00:00", "12:00:00"),
            window_row(Uuid::new_v4(), 3, "09:00:00", "12:00:00")
        ])))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let windows = service
        .create_availability(
            create_request(
                vec![DayOfWeek::Monday, DayOfWeek::Wednesday],
                "09:00",
                "12:00",
                30,
            ),
            TOKEN,
        )
        .await
        .unwrap();

    assert_eq!(windows.len(), 2);
}

#[tokio::test]
async fn field_validation_runs_before_touching_the_store() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let service = service_for(&server);

    let err = service
        .create_availability(create_request(vec![DayOfWeek::Monday], "09:00", "12:00", 10), TOKEN)
        .await
        .unwrap_err();
    assert!(matches!(err, AvailabilityError::Validation(_)));

    let err = service
        .create_availability(create_request(vec![DayOfWeek::Monday], "12:00", "09:00", 30), TOKEN)
        .await
        .unwrap_err();
    assert!(matches!(err, AvailabilityError::Validation(_)));

    let err = service
        .create_availability(create_request(vec![], "09:00", "12:00", 30), TOKEN)
        .await
        .unwrap_err();
    assert!(matches!(err, AvailabilityError::Validation(_)));
}

#[tokio::test]
async fn update_overlap_check_excludes_the_edited_window() {
    let server = MockServer::start().await;
    let window_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .and(query_param("id", format!("eq.{}", window_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            window_row(window_id, 1, "09:00:00", "12:00:00")
        ])))
        .mount(&server)
        .await;

    // The only active window on Monday is the one being edited
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .and(query_param("day_of_week", "in.(1)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            window_row(window_id, 1, "09:00:00", "12:00:00")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            window_row(window_id, 1, "10:00:00", "13:00:00")
        ])))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let updated = service
        .update_availability(
            &window_id.to_string(),
            UpdateAvailabilityRequest {
                day_of_week: DayOfWeek::Monday,
                start_time: NaiveTime::parse_from_str("10:00", "%H:%M").unwrap(),
                end_time: NaiveTime::parse_from_str("13:00", "%H:%M").unwrap(),
                slot_duration_minutes: 30,
            },
            TOKEN,
        )
        .await
        .unwrap();

    assert_eq!(updated.start_time, NaiveTime::parse_from_str("10:00", "%H:%M").unwrap());
}

#[tokio::test]
async fn concurrent_insert_conflict_surfaces_as_overlap() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    // Exclusion constraint fired: another admin committed an overlapping row
    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(409).set_body_string(
            r#"{"code":"23P01","message":"conflicting key value violates exclusion constraint"}"#,
        ))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .create_availability(create_request(vec![DayOfWeek::Monday], "09:00", "12:00", 30), TOKEN)
        .await
        .unwrap_err();

    assert!(matches!(err, AvailabilityError::Overlap(_)));
}

#[tokio::test]
async fn soft_delete_of_unknown_window_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .soft_delete_availability(&Uuid::new_v4().to_string(), TOKEN)
        .await
        .unwrap_err();

    assert!(matches!(err, AvailabilityError::NotFound));
}

#[tokio::test]
async fn soft_delete_marks_the_window_inactive() {
    let server = MockServer::start().await;
    let window_id = Uuid::new_v4();

    let mut row = window_row(window_id, 1, "09:00:00", "12:00:00");
    row["is_active"] = json!(false);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_windows"))
        .and(query_param("id", format!("eq.{}", window_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&server)
        .await;

    let service = service_for(&server);
    service
        .soft_delete_availability(&window_id.to_string(), TOKEN)
        .await
        .unwrap();
}
