use chrono::{NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};

use crate::models::{
    AvailabilityError, AvailabilityWindow, CreateAvailabilityRequest, DayOfWeek,
    UpdateAvailabilityRequest, MAX_SLOT_DURATION_MINUTES, MIN_SLOT_DURATION_MINUTES,
};
use crate::overlap;

pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create one window per requested day, sharing start/end/duration.
    /// The whole batch is validated first and written with a single bulk
    /// insert, so one conflicting day fails every day. The database keeps an
    /// exclusion constraint over (doctor_name, day_of_week, time range) for
    /// active rows; a 409 from the insert means another admin won a
    /// concurrent edit and is reported as the same overlap condition.
    pub async fn create_availability(
        &self,
        request: CreateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        debug!(
            "Creating availability for doctor {} on {} day(s)",
            request.doctor_name,
            request.days_of_week.len()
        );

        validate_window_fields(
            request.start_time,
            request.end_time,
            request.slot_duration_minutes,
        )?;

        if request.days_of_week.is_empty() {
            return Err(AvailabilityError::Validation(
                "days_of_week must name at least one day".to_string(),
            ));
        }

        let mut days: Vec<DayOfWeek> = Vec::new();
        for day in &request.days_of_week {
            if !days.contains(day) {
                days.push(*day);
            }
        }

        let existing = self
            .active_windows_for_days(&request.doctor_name, &days, auth_token)
            .await?;

        for day in &days {
            let on_day: Vec<AvailabilityWindow> = existing
                .iter()
                .filter(|w| w.day_of_week == day.iso_number())
                .cloned()
                .collect();

            if let Some(conflict) =
                overlap::find_conflict(request.start_time, request.end_time, &on_day)
            {
                warn!(
                    "Overlap rejected for doctor {} on {}: {} - {}",
                    request.doctor_name, day, conflict.start_time, conflict.end_time
                );
                return Err(AvailabilityError::Overlap(format!(
                    "{} {} - {}",
                    day, conflict.start_time, conflict.end_time
                )));
            }
        }

        let now = Utc::now();
        let rows: Vec<Value> = days
            .iter()
            .map(|day| {
                json!({
                    "doctor_name": request.doctor_name,
                    "day_of_week": day.iso_number(),
                    "start_time": request.start_time.format("%H:%M:%S").to_string(),
                    "end_time": request.end_time.format("%H:%M:%S").to_string(),
                    "slot_duration_minutes": request.slot_duration_minutes,
                    "is_active": true,
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339()
                })
            })
            .collect();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/availability_windows",
                Some(auth_token),
                Some(Value::Array(rows)),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                DbError::Conflict(_) => AvailabilityError::Overlap(
                    "an overlapping window was created concurrently".to_string(),
                ),
                other => AvailabilityError::Database(other.to_string()),
            })?;

        if result.is_empty() {
            return Err(AvailabilityError::Database(
                "Failed to create availability windows".to_string(),
            ));
        }

        let windows = parse_windows(result)?;
        debug!("Created {} availability window(s)", windows.len());
        Ok(windows)
    }

    /// Overwrite a single window's day/start/end/duration in place, after
    /// re-running the overlap check against every other active window for
    /// the same doctor and target day.
    pub async fn update_availability(
        &self,
        availability_id: &str,
        request: UpdateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        debug!("Updating availability window: {}", availability_id);

        validate_window_fields(
            request.start_time,
            request.end_time,
            request.slot_duration_minutes,
        )?;

        let current = self.get_window_by_id(availability_id, auth_token).await?;

        let others: Vec<AvailabilityWindow> = self
            .active_windows_for_days(&current.doctor_name, &[request.day_of_week], auth_token)
            .await?
            .into_iter()
            .filter(|w| w.id != current.id)
            .collect();

        if let Some(conflict) =
            overlap::find_conflict(request.start_time, request.end_time, &others)
        {
            return Err(AvailabilityError::Overlap(format!(
                "{} {} - {}",
                request.day_of_week, conflict.start_time, conflict.end_time
            )));
        }

        let update_data = json!({
            "day_of_week": request.day_of_week.iso_number(),
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "slot_duration_minutes": request.slot_duration_minutes,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/availability_windows?id=eq.{}", availability_id);
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
                Some(update_data),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                DbError::Conflict(_) => AvailabilityError::Overlap(
                    "an overlapping window was created concurrently".to_string(),
                ),
                other => AvailabilityError::Database(other.to_string()),
            })?;

        let mut windows = parse_windows(result)?;
        windows.pop().ok_or(AvailabilityError::NotFound)
    }

    /// Tombstone a window. Existing appointments booked against it are left
    /// untouched; only future slot generation stops seeing it.
    pub async fn soft_delete_availability(
        &self,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<(), AvailabilityError> {
        debug!("Deactivating availability window: {}", availability_id);

        let update_data = json!({
            "is_active": false,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/availability_windows?id=eq.{}", availability_id);
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
                Some(update_data),
                Some(headers),
            )
            .await
            .map_err(|e| AvailabilityError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(AvailabilityError::NotFound);
        }

        Ok(())
    }

    /// All active windows, Monday-first then doctor then start time, for the
    /// administrative schedule view.
    pub async fn list_active(
        &self,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let path = "/rest/v1/availability_windows?is_active=eq.true\
                    &order=day_of_week.asc,doctor_name.asc,start_time.asc";

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| AvailabilityError::Database(e.to_string()))?;

        parse_windows(result)
    }

    /// Active windows for one doctor across the whole week.
    pub async fn active_windows_for_doctor(
        &self,
        doctor_name: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let path = format!(
            "/rest/v1/availability_windows?doctor_name=eq.{}&is_active=eq.true\
             &order=day_of_week.asc,start_time.asc",
            urlencoding::encode(doctor_name)
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| AvailabilityError::Database(e.to_string()))?;

        parse_windows(result)
    }

    /// Active windows for one doctor on one weekday, ordered by start time.
    pub async fn active_windows_for_weekday(
        &self,
        doctor_name: &str,
        day: DayOfWeek,
        auth_token: Option<&str>,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let path = format!(
            "/rest/v1/availability_windows?doctor_name=eq.{}&day_of_week=eq.{}\
             &is_active=eq.true&order=start_time.asc",
            urlencoding::encode(doctor_name),
            day.iso_number()
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| AvailabilityError::Database(e.to_string()))?;

        parse_windows(result)
    }

    // Private helper methods

    async fn get_window_by_id(
        &self,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        let path = format!("/rest/v1/availability_windows?id=eq.{}", availability_id);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AvailabilityError::Database(e.to_string()))?;

        let mut windows = parse_windows(result)?;
        windows.pop().ok_or(AvailabilityError::NotFound)
    }

    async fn active_windows_for_days(
        &self,
        doctor_name: &str,
        days: &[DayOfWeek],
        auth_token: &str,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let day_numbers: Vec<String> = days.iter().map(|d| d.iso_number().to_string()).collect();
        let path = format!(
            "/rest/v1/availability_windows?doctor_name=eq.{}&day_of_week=in.({})\
             &is_active=eq.true",
            urlencoding::encode(doctor_name),
            day_numbers.join(",")
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AvailabilityError::Database(e.to_string()))?;

        parse_windows(result)
    }
}

fn parse_windows(values: Vec<Value>) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
    values
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<AvailabilityWindow>, _>>()
        .map_err(|e| AvailabilityError::Database(format!("Failed to parse windows: {}", e)))
}

fn validate_window_fields(
    start: NaiveTime,
    end: NaiveTime,
    slot_duration_minutes: i32,
) -> Result<(), AvailabilityError> {
    if overlap::minutes_of_day(end) <= overlap::minutes_of_day(start) {
        return Err(AvailabilityError::Validation(
            "end_time must be after start_time".to_string(),
        ));
    }

    if !(MIN_SLOT_DURATION_MINUTES..=MAX_SLOT_DURATION_MINUTES).contains(&slot_duration_minutes) {
        return Err(AvailabilityError::Validation(format!(
            "slot_duration_minutes must be between {} and {}",
            MIN_SLOT_DURATION_MINUTES, MAX_SLOT_DURATION_MINUTES
        )));
    }

    Ok(())
}
