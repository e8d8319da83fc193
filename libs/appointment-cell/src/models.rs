// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use clinic_cell::ClinicError;
use shared_database::supabase::is_conflict;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    // Snapshot of the clinic at booking time; never re-joined.
    pub clinic_name: String,
    pub clinic_address: String,
    pub clinic_phone: Option<String>,
    pub clinic_email: Option<String>,
    pub service: String,
    pub date: NaiveDate,
    /// Local wall-clock `HH:MM`.
    pub time: String,
    pub notes: Option<String>,
    pub complaint: Option<String>,
    #[serde(default)]
    pub urgent: bool,
    pub price: Option<f64>,
    pub payment_status: Option<PaymentStatus>,
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// Whether this appointment holds its clinic/doctor/date/time slot.
    pub fn occupies_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    /// Two appointments collide when both hold a slot at the same clinic, date,
    /// time and doctor (or both have no doctor).
    pub fn collides_with(&self, other: &Appointment) -> bool {
        self.id != other.id
            && self.occupies_slot()
            && other.occupies_slot()
            && self.clinic_id == other.clinic_id
            && self.date == other.date
            && self.doctor_id == other.doctor_id
            && same_clock(&self.time, &other.time)
    }

    pub fn can_request_change(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn can_be_reviewed(&self) -> bool {
        self.status == AppointmentStatus::Completed
    }
}

fn same_clock(a: &str, b: &str) -> bool {
    match (clinic_cell::parse_clock_minutes(a), clinic_cell::parse_clock_minutes(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.trim() == b.trim(),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

/// Operator-facing actions on an appointment, each mapping to one target status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusAction {
    Confirm,
    Cancel,
    Complete,
}

impl StatusAction {
    pub fn target_status(&self) -> AppointmentStatus {
        match self {
            StatusAction::Confirm => AppointmentStatus::Confirmed,
            StatusAction::Cancel => AppointmentStatus::Cancelled,
            StatusAction::Complete => AppointmentStatus::Completed,
        }
    }
}

/// The two sides of an appointment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Clinic,
    #[serde(alias = "patient")]
    User,
}

impl Party {
    pub fn opposite(&self) -> Party {
        match self {
            Party::Clinic => Party::User,
            Party::User => Party::Clinic,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Clinic => write!(f, "clinic"),
            Party::User => write!(f, "user"),
        }
    }
}

// ==============================================================================
// CHANGE REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ChangeRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeRequestStatus::Pending => write!(f, "pending"),
            ChangeRequestStatus::Approved => write!(f, "approved"),
            ChangeRequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Sparse set of proposed changes; `None` means unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeDeltas {
    pub new_date: Option<NaiveDate>,
    pub new_time: Option<String>,
    pub new_doctor_id: Option<Uuid>,
    pub new_service: Option<String>,
}

impl ChangeDeltas {
    pub fn is_empty(&self) -> bool {
        self.new_date.is_none()
            && self.new_time.is_none()
            && self.new_doctor_id.is_none()
            && self.new_service.is_none()
    }

    /// Writes every present field onto the appointment and leaves the rest alone.
    pub fn apply_to(&self, appointment: &mut Appointment) {
        if let Some(date) = self.new_date {
            appointment.date = date;
        }
        if let Some(time) = &self.new_time {
            appointment.time = time.clone();
        }
        if let Some(doctor_id) = self.new_doctor_id {
            appointment.doctor_id = Some(doctor_id);
        }
        if let Some(service) = &self.new_service {
            appointment.service = service.clone();
        }
    }

    /// Copies the fields this delta names from `source` onto `target`.
    pub fn copy_named_fields(&self, source: &Appointment, target: &mut Appointment) {
        if self.new_date.is_some() {
            target.date = source.date;
        }
        if self.new_time.is_some() {
            target.time = source.time.clone();
        }
        if self.new_doctor_id.is_some() {
            target.doctor_id = source.doctor_id;
        }
        if self.new_service.is_some() {
            target.service = source.service.clone();
        }
    }

    pub fn moves_slot(&self) -> bool {
        self.new_date.is_some() || self.new_time.is_some() || self.new_doctor_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRequest {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub requested_by: Party,
    pub requester_id: String,
    #[serde(flatten)]
    pub deltas: ChangeDeltas,
    pub reason: Option<String>,
    pub status: ChangeRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ChangeRequest {
    pub fn is_pending(&self) -> bool {
        self.status == ChangeRequestStatus::Pending
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub clinic_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub service: String,
    pub date: NaiveDate,
    pub time: String,
    pub notes: Option<String>,
    pub complaint: Option<String>,
    #[serde(default)]
    pub urgent: bool,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChangeRequestRequest {
    #[serde(flatten)]
    pub deltas: ChangeDeltas,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub clinic_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl AppointmentSearchQuery {
    pub fn for_clinic_on(clinic_id: Uuid, date: NaiveDate) -> Self {
        Self {
            clinic_id: Some(clinic_id),
            from_date: Some(date),
            to_date: Some(date),
            ..Self::default()
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.clinic_id.map_or(true, |id| appointment.clinic_id == id)
            && self.user_id.map_or(true, |id| appointment.user_id == id)
            && self.doctor_id.map_or(true, |id| appointment.doctor_id == Some(id))
            && self.status.map_or(true, |s| appointment.status == s)
            && self.from_date.map_or(true, |d| appointment.date >= d)
            && self.to_date.map_or(true, |d| appointment.date <= d)
    }
}

/// Outcome of approving a change request: both records as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequestResolution {
    pub change_request: ChangeRequest,
    pub appointment: Appointment,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Coarse failure kind, stable for UI localization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Validation,
    Conflict,
    Unauthorized,
    Unexpected,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error, PartialEq)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Change request not found")]
    ChangeRequestNotFound,

    #[error("Clinic not found")]
    ClinicNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Appointment slot not available")]
    SlotNotAvailable,

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::NotFound
            | AppointmentError::ChangeRequestNotFound
            | AppointmentError::ClinicNotFound
            | AppointmentError::DoctorNotFound => ErrorKind::NotFound,
            AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::InvalidState(_) => ErrorKind::InvalidState,
            AppointmentError::ValidationError(_) => ErrorKind::Validation,
            AppointmentError::SlotNotAvailable => ErrorKind::Conflict,
            AppointmentError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppointmentError::DatabaseError(_) => ErrorKind::Unexpected,
        }
    }

    pub fn message_key(&self) -> &'static str {
        match self {
            AppointmentError::NotFound => "appointment.not_found",
            AppointmentError::ChangeRequestNotFound => "change_request.not_found",
            AppointmentError::ClinicNotFound => "clinic.not_found",
            AppointmentError::DoctorNotFound => "doctor.not_found",
            AppointmentError::SlotNotAvailable => "appointment.slot_taken",
            AppointmentError::InvalidStatusTransition { .. } => "appointment.invalid_transition",
            AppointmentError::InvalidState(_) => "appointment.invalid_state",
            AppointmentError::ValidationError(_) => "appointment.validation",
            AppointmentError::Unauthorized(_) => "common.unauthorized",
            AppointmentError::DatabaseError(_) => "common.unexpected_error",
        }
    }
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        if is_conflict(&err) {
            AppointmentError::SlotNotAvailable
        } else {
            AppointmentError::DatabaseError(err.to_string())
        }
    }
}

impl From<ClinicError> for AppointmentError {
    fn from(err: ClinicError) -> Self {
        match err {
            ClinicError::NotFound => AppointmentError::ClinicNotFound,
            ClinicError::StaffNotFound => AppointmentError::DoctorNotFound,
            ClinicError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            ClinicError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

impl From<serde_json::Error> for AppointmentError {
    fn from(err: serde_json::Error) -> Self {
        AppointmentError::DatabaseError(format!("Malformed row: {}", err))
    }
}
