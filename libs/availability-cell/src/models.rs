use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_models::error::AppError;

/// Bounds for the bookable slot length carried by a window.
pub const MIN_SLOT_DURATION_MINUTES: i32 = 15;
pub const MAX_SLOT_DURATION_MINUTES: i32 = 240;

/// Serde codec for wall-clock times on the wire ("09:00", no seconds).
/// Stored times come back from PostgREST as "09:00:00" and go through the
/// models' default chrono serde instead.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&value, FORMAT)
            .map_err(|_| serde::de::Error::custom(format!("invalid time '{}', expected HH:MM", value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// ISO weekday number, Monday = 1 .. Sunday = 7. Stored as-is so that
    /// ascending database order is Monday-first.
    pub fn iso_number(&self) -> i32 {
        match self {
            DayOfWeek::Monday => 1,
            DayOfWeek::Tuesday => 2,
            DayOfWeek::Wednesday => 3,
            DayOfWeek::Thursday => 4,
            DayOfWeek::Friday => 5,
            DayOfWeek::Saturday => 6,
            DayOfWeek::Sunday => 7,
        }
    }

    pub fn from_iso(number: i32) -> Option<Self> {
        match number {
            1 => Some(DayOfWeek::Monday),
            2 => Some(DayOfWeek::Tuesday),
            3 => Some(DayOfWeek::Wednesday),
            4 => Some(DayOfWeek::Thursday),
            5 => Some(DayOfWeek::Friday),
            6 => Some(DayOfWeek::Saturday),
            7 => Some(DayOfWeek::Sunday),
            _ => None,
        }
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        };
        write!(f, "{}", name)
    }
}

/// A recurring weekly block of bookable time for one doctor. Windows are
/// tombstoned via `is_active` rather than deleted, so history behind past
/// bookings stays intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub doctor_name: String,
    pub day_of_week: i32, // ISO: 1 = Monday .. 7 = Sunday
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityWindow {
    pub fn day(&self) -> Option<DayOfWeek> {
        DayOfWeek::from_iso(self.day_of_week)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub doctor_name: String,
    pub days_of_week: Vec<DayOfWeek>,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub day_of_week: DayOfWeek,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Availability conflicts with existing schedule: {0}")]
    Overlap(String),

    #[error("Availability window not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::Validation(msg) => AppError::ValidationError(msg),
            AvailabilityError::Overlap(msg) => {
                AppError::Conflict(format!("Availability conflicts with existing schedule: {}", msg))
            }
            AvailabilityError::NotFound => {
                AppError::NotFound("Availability window not found".to_string())
            }
            AvailabilityError::Database(msg) => AppError::Database(msg),
        }
    }
}
