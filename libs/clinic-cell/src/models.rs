// libs/clinic-cell/src/models.rs
use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CLINIC
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub working_hours: Vec<WorkingHours>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Clinic {
    pub fn hours_for(&self, weekday: Weekday) -> Option<&WorkingHours> {
        find_working_hours(&self.working_hours, weekday)
    }
}

// ==============================================================================
// WORKING HOURS
// ==============================================================================

/// Opening window for one weekday. Times are the clinic's local wall clock, `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkingHours {
    pub day: String,
    pub open_time: String,
    pub close_time: String,
    #[serde(default)]
    pub closed: bool,
}

impl WorkingHours {
    pub fn open(day: Weekday, open_time: &str, close_time: &str) -> Self {
        Self {
            day: weekday_name(day).to_string(),
            open_time: open_time.to_string(),
            close_time: close_time.to_string(),
            closed: false,
        }
    }

    pub fn closed(day: Weekday) -> Self {
        Self {
            day: weekday_name(day).to_string(),
            open_time: "00:00".to_string(),
            close_time: "00:00".to_string(),
            closed: true,
        }
    }

    pub fn is_for(&self, weekday: Weekday) -> bool {
        self.day.trim().eq_ignore_ascii_case(weekday_name(weekday))
    }

    /// Open and close as minutes after midnight, `None` when either is unparsable
    /// or the window is empty.
    pub fn window_minutes(&self) -> Option<(u32, u32)> {
        let open = parse_clock_minutes(&self.open_time)?;
        let close = parse_clock_minutes(&self.close_time)?;
        (open < close).then_some((open, close))
    }

    /// Strict check used when a schedule is written. Reading paths skip bad
    /// entries instead of failing.
    pub fn validate(&self) -> Result<(), ClinicError> {
        if parse_weekday(&self.day).is_none() {
            return Err(ClinicError::ValidationError(format!("Unknown day '{}'", self.day)));
        }
        if self.closed {
            return Ok(());
        }
        let open = parse_clock_minutes(&self.open_time).ok_or_else(|| {
            ClinicError::ValidationError(format!("Invalid open time '{}' on {}", self.open_time, self.day))
        })?;
        let close = parse_clock_minutes(&self.close_time).ok_or_else(|| {
            ClinicError::ValidationError(format!("Invalid close time '{}' on {}", self.close_time, self.day))
        })?;
        if open >= close {
            return Err(ClinicError::ValidationError(format!(
                "Open time must precede close time on {}",
                self.day
            )));
        }
        Ok(())
    }
}

pub fn find_working_hours(hours: &[WorkingHours], weekday: Weekday) -> Option<&WorkingHours> {
    hours.iter().find(|entry| entry.is_for(weekday))
}

/// Monday through Sunday, the order schedules are stored and displayed in.
pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn parse_weekday(name: &str) -> Option<Weekday> {
    WEEK.iter()
        .copied()
        .find(|day| weekday_name(*day).eq_ignore_ascii_case(name.trim()))
}

/// Parses `HH:MM` (seconds tolerated, as returned by SQL `time` columns) into
/// minutes after midnight.
pub fn parse_clock_minutes(value: &str) -> Option<u32> {
    let mut parts = value.trim().split(':');
    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    if let Some(seconds) = parts.next() {
        let seconds: u32 = seconds.parse().ok()?;
        if seconds >= 60 {
            return None;
        }
    }
    if parts.next().is_some() || hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

pub fn format_clock(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Normalizes any accepted clock string to zero-padded `HH:MM`.
pub fn normalize_clock(value: &str) -> Option<String> {
    parse_clock_minutes(value).map(format_clock)
}

// ==============================================================================
// STAFF
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Doctor,
    Hygienist,
    Assistant,
    Receptionist,
    Manager,
    Other,
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffRole::Doctor => write!(f, "doctor"),
            StaffRole::Hygienist => write!(f, "hygienist"),
            StaffRole::Assistant => write!(f, "assistant"),
            StaffRole::Receptionist => write!(f, "receptionist"),
            StaffRole::Manager => write!(f, "manager"),
            StaffRole::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffMember {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub title: String,
    pub specialty: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    /// `None` only for rows created before roles existed; see `migrate_staff_roles`.
    pub role: Option<StaffRole>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl StaffMember {
    pub fn is_doctor(&self) -> bool {
        self.role == Some(StaffRole::Doctor)
    }

    pub fn is_bookable_doctor(&self) -> bool {
        self.is_active && self.is_doctor()
    }

    /// Staff with an empty service list are treated as offering every service.
    pub fn provides(&self, service: &str) -> bool {
        self.services.is_empty()
            || self.services.iter().any(|s| s.trim().eq_ignore_ascii_case(service.trim()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStaffRequest {
    pub name: String,
    pub title: String,
    pub role: StaffRole,
    pub specialty: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceWorkingHoursRequest {
    pub working_hours: Vec<WorkingHours>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error, PartialEq)]
pub enum ClinicError {
    #[error("Clinic not found")]
    NotFound,

    #[error("Staff member not found")]
    StaffNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl ClinicError {
    pub fn message_key(&self) -> &'static str {
        match self {
            ClinicError::NotFound => "clinic.not_found",
            ClinicError::StaffNotFound => "clinic.staff_not_found",
            ClinicError::ValidationError(_) => "clinic.validation",
            ClinicError::DatabaseError(_) => "common.unexpected_error",
        }
    }
}

impl From<anyhow::Error> for ClinicError {
    fn from(err: anyhow::Error) -> Self {
        ClinicError::DatabaseError(err.to_string())
    }
}

fn default_true() -> bool {
    true
}
