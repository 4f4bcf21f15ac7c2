use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::models::{AvailabilityWindow, DayOfWeek};
use availability_cell::services::availability::AvailabilityService;
use availability_cell::slots;
use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    AppointmentStatusCounts, AvailableDatesResponse, AvailableDay, BookAppointmentRequest,
    CancelAppointmentRequest, SlotResponse,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notify::NotificationService;
use crate::services::triage::TriageService;
use crate::services::video::VideoService;

pub const DEFAULT_HORIZON_DAYS: i64 = 30;

const SCHEDULE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct BookingService {
    supabase: SupabaseClient,
    availability: AvailabilityService,
    lifecycle: AppointmentLifecycleService,
    notify: NotificationService,
    triage: TriageService,
    video: VideoService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            availability: AvailabilityService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
            notify: NotificationService::new(config),
            triage: TriageService::new(config),
            video: VideoService::new(config),
        }
    }

    /// Dates in `[from, from + horizon_days)` where the doctor still has at
    /// least one open slot. A doctor without any active window in the
    /// horizon reports `has_availability = false`, which callers must keep
    /// distinct from an empty date list caused by full booking.
    pub async fn get_available_dates(
        &self,
        doctor_name: &str,
        from: NaiveDate,
        horizon_days: i64,
        auth_token: Option<&str>,
    ) -> Result<AvailableDatesResponse, AppointmentError> {
        debug!(
            "Resolving available dates for doctor {} over {} day(s)",
            doctor_name, horizon_days
        );

        let windows = self
            .availability
            .active_windows_for_doctor(doctor_name, auth_token)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        if windows.is_empty() {
            return Ok(AvailableDatesResponse {
                doctor_name: doctor_name.to_string(),
                has_availability: false,
                dates: vec![],
            });
        }

        let mut windows_by_day: HashMap<i32, Vec<AvailabilityWindow>> = HashMap::new();
        for window in windows {
            windows_by_day.entry(window.day_of_week).or_default().push(window);
        }

        let booked = self
            .booked_schedules_in_range(
                doctor_name,
                from,
                from + Duration::days(horizon_days),
                auth_token,
            )
            .await?;

        let mut dates = Vec::new();
        for offset in 0..horizon_days {
            let date = from + Duration::days(offset);
            let day = DayOfWeek::from_weekday(date.weekday());

            let Some(day_windows) = windows_by_day.get(&day.iso_number()) else {
                continue;
            };

            let remaining = day_windows
                .iter()
                .flat_map(slots::generate)
                .filter(|slot| !booked.contains(&date.and_time(*slot)))
                .count();

            if remaining > 0 {
                dates.push(AvailableDay {
                    date,
                    day_of_week: day.to_string(),
                    available_slot_count: remaining,
                });
            }
        }

        Ok(AvailableDatesResponse {
            doctor_name: doctor_name.to_string(),
            has_availability: true,
            dates,
        })
    }

    /// Remaining slot start times for one doctor and date. Always re-derived
    /// from the availability store and appointment table; nothing is cached,
    /// since bookings may land between a patient viewing dates and slots.
    pub async fn get_available_slots(
        &self,
        doctor_name: &str,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<SlotResponse>, AppointmentError> {
        let day = DayOfWeek::from_weekday(date.weekday());

        let windows = self
            .availability
            .active_windows_for_weekday(doctor_name, day, auth_token)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        if windows.is_empty() {
            return Ok(vec![]);
        }

        let booked = self
            .booked_schedules_in_range(doctor_name, date, date + Duration::days(1), auth_token)
            .await?;

        let mut times: Vec<NaiveTime> = windows
            .iter()
            .flat_map(slots::generate)
            .filter(|slot| !booked.contains(&date.and_time(*slot)))
            .collect();
        times.sort();
        times.dedup();

        Ok(times
            .into_iter()
            .map(|time| SlotResponse {
                time,
                formatted_time: time.format("%-I:%M %p").to_string(),
            })
            .collect())
    }

    /// The reservation. Everything a stale slot grid may have promised is
    /// re-verified here at write time: the weekday/time must still fall on a
    /// slot an active window generates, and no non-cancelled appointment may
    /// hold the same (doctor, schedule). The insert itself is guarded by the
    /// database's partial unique index over (doctor_name, schedule) for
    /// non-cancelled rows, so of two concurrent bookings exactly one commits
    /// and the other surfaces as `SlotTaken`.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {} at {} {}",
            request.patient_id, request.doctor_name, request.date, request.time
        );

        if request.reason.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "reason must not be empty".to_string(),
            ));
        }

        let day = DayOfWeek::from_weekday(request.date.weekday());
        let windows = self
            .availability
            .active_windows_for_weekday(&request.doctor_name, day, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        if !windows.iter().any(|w| slots::is_slot_start(w, request.time)) {
            return Err(AppointmentError::DoctorNotAvailable);
        }

        let patient = self.get_patient(request.patient_id, auth_token).await?;

        let schedule = request.date.and_time(request.time);
        if self.is_slot_occupied(&request.doctor_name, schedule, auth_token).await? {
            return Err(AppointmentError::SlotTaken);
        }

        let now = Utc::now();
        let appointment_data = json!({
            "patient_id": request.patient_id,
            "doctor_name": request.doctor_name,
            "schedule": schedule.format(SCHEDULE_FORMAT).to_string(),
            "reason": request.reason,
            "status": AppointmentStatus::Pending.to_string(),
            "note": request.note,
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
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                // Unique constraint on (doctor_name, schedule) for
                // non-cancelled rows: the other booking won the race
                DbError::Conflict(_) => AppointmentError::SlotTaken,
                other => AppointmentError::Database(other.to_string()),
            })?;

        let appointment = parse_appointment_row(result)?;

        self.handle_post_booking_tasks(&appointment, &patient, auth_token).await;

        info!(
            "Appointment {} created in pending status for doctor {}",
            appointment.id, appointment.doctor_name
        );
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        parse_appointment_row(result)
    }

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = Vec::new();

        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(doctor_name) = query.doctor_name {
            query_parts.push(format!("doctor_name=eq.{}", urlencoding::encode(&doctor_name)));
        }
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }

        let mut path = format!(
            "/rest/v1/appointments?{}&order=schedule.desc",
            query_parts.join("&")
        );

        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    AppointmentError::Database(format!("Failed to parse appointments: {}", e))
                })
            })
            .collect()
    }

    /// Status breakdown for the administrative dashboard.
    pub async fn status_counts(
        &self,
        auth_token: &str,
    ) -> Result<AppointmentStatusCounts, AppointmentError> {
        let result: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/appointments?select=status",
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let mut counts = AppointmentStatusCounts {
            pending: 0,
            scheduled: 0,
            cancelled: 0,
        };

        for row in result {
            match row["status"].as_str() {
                Some("pending") => counts.pending += 1,
                Some("scheduled") => counts.scheduled += 1,
                Some("cancelled") => counts.cancelled += 1,
                _ => {}
            }
        }

        Ok(counts)
    }

    /// Administrative approval: `pending -> scheduled`. The update is guarded
    /// on the current status so a concurrent transition loses cleanly instead
    /// of overwriting it.
    pub async fn schedule_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(&current.status, &AppointmentStatus::Scheduled)?;

        let update_data = json!({
            "status": AppointmentStatus::Scheduled.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment_id,
            AppointmentStatus::Pending
        );

        let result = self.patch_appointment(&path, update_data, auth_token).await?;
        let Some(mut appointment) = result else {
            // Lost the race against another transition
            return Err(AppointmentError::InvalidStatusTransition(current.status));
        };

        self.handle_post_schedule_tasks(&mut appointment, auth_token).await;

        info!("Appointment {} approved and scheduled", appointment.id);
        Ok(appointment)
    }

    /// Cancellation frees the slot for anyone. Idempotent in effect; a
    /// cancellation losing a write race still converges on `cancelled`.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if request.cancellation_reason.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "cancellation_reason must not be empty".to_string(),
            ));
        }

        let current = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(&current.status, &AppointmentStatus::Cancelled)?;

        let update_data = json!({
            "status": AppointmentStatus::Cancelled.to_string(),
            "cancellation_reason": request.cancellation_reason,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=in.(pending,scheduled)",
            appointment_id
        );

        let result = self.patch_appointment(&path, update_data, auth_token).await?;
        let Some(appointment) = result else {
            return Err(AppointmentError::InvalidStatusTransition(current.status));
        };

        self.handle_post_cancellation_tasks(&appointment, auth_token).await;

        info!("Appointment {} cancelled, slot released", appointment.id);
        Ok(appointment)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    /// Schedules of non-cancelled appointments in `[start, end)`.
    async fn booked_schedules_in_range(
        &self,
        doctor_name: &str,
        start: NaiveDate,
        end: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<HashSet<NaiveDateTime>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_name=eq.{}&select=schedule\
             &status=in.(pending,scheduled)&schedule=gte.{}T00:00:00&schedule=lt.{}T00:00:00",
            urlencoding::encode(doctor_name),
            start,
            end
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let mut booked = HashSet::new();
        for row in result {
            let Some(raw) = row["schedule"].as_str() else {
                continue;
            };
            match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
                Ok(schedule) => {
                    booked.insert(schedule);
                }
                Err(e) => warn!("Skipping unparseable schedule '{}': {}", raw, e),
            }
        }

        Ok(booked)
    }

    async fn is_slot_occupied(
        &self,
        doctor_name: &str,
        schedule: NaiveDateTime,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_name=eq.{}&schedule=eq.{}\
             &status=in.(pending,scheduled)&select=id",
            urlencoding::encode(doctor_name),
            schedule.format(SCHEDULE_FORMAT)
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        Ok(!result.is_empty())
    }

    async fn get_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Value, AppointmentError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);

        let mut result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        result.pop().ok_or(AppointmentError::PatientNotFound)
    }

    async fn patch_appointment(
        &self,
        path: &str,
        update_data: Value,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                path,
                Some(auth_token),
                Some(update_data),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        if result.is_empty() {
            return Ok(None);
        }

        parse_appointment_row(result).map(Some)
    }

    // ==============================================================================
    // BEST-EFFORT UPSTREAM GLUE
    //
    // External collaborators never block or fail the core operation; their
    // failures are logged and swallowed.
    // ==============================================================================

    async fn handle_post_booking_tasks(
        &self,
        appointment: &Appointment,
        patient: &Value,
        auth_token: &str,
    ) {
        if let Err(e) = self.triage.analyze_and_attach(appointment, auth_token).await {
            warn!(
                "Triage analysis failed for appointment {}: {}",
                appointment.id, e
            );
        }

        if self.notify.is_configured() {
            if let Some(email) = patient["email"].as_str() {
                if let Err(e) = self.notify.booking_received(appointment, email).await {
                    warn!(
                        "Booking confirmation email failed for appointment {}: {}",
                        appointment.id, e
                    );
                }
            }
        }
    }

    async fn handle_post_schedule_tasks(&self, appointment: &mut Appointment, auth_token: &str) {
        match self.video.create_session_link(appointment.id).await {
            Ok(Some(link)) => {
                let update = json!({ "video_link": link, "updated_at": Utc::now().to_rfc3339() });
                let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
                match self.patch_appointment(&path, update, auth_token).await {
                    Ok(Some(updated)) => *appointment = updated,
                    Ok(None) => {}
                    Err(e) => warn!(
                        "Failed to store video link for appointment {}: {}",
                        appointment.id, e
                    ),
                }
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Video session creation failed for appointment {}: {}",
                appointment.id, e
            ),
        }

        if let Some(email) = self.patient_email(appointment, auth_token).await {
            if let Err(e) = self.notify.appointment_scheduled(appointment, &email).await {
                warn!(
                    "Scheduling notification email failed for appointment {}: {}",
                    appointment.id, e
                );
            }
        }
    }

    async fn handle_post_cancellation_tasks(&self, appointment: &Appointment, auth_token: &str) {
        if let Some(email) = self.patient_email(appointment, auth_token).await {
            if let Err(e) = self.notify.appointment_cancelled(appointment, &email).await {
                warn!(
                    "Cancellation notification email failed for appointment {}: {}",
                    appointment.id, e
                );
            }
        }
    }

    async fn patient_email(&self, appointment: &Appointment, auth_token: &str) -> Option<String> {
        if !self.notify.is_configured() {
            return None;
        }

        match self.get_patient(appointment.patient_id, auth_token).await {
            Ok(patient) => patient["email"].as_str().map(str::to_string),
            Err(e) => {
                warn!(
                    "Could not load patient {} for notification: {}",
                    appointment.patient_id, e
                );
                None
            }
        }
    }
}

fn parse_appointment_row(mut rows: Vec<Value>) -> Result<Appointment, AppointmentError> {
    let row = rows
        .pop()
        .ok_or_else(|| AppointmentError::Database("Empty appointment response".to_string()))?;

    serde_json::from_value(row)
        .map_err(|e| AppointmentError::Database(format!("Failed to parse appointment: {}", e)))
}
