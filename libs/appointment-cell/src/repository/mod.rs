// libs/appointment-cell/src/repository/mod.rs
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, ChangeDeltas,
    ChangeRequest, ChangeRequestStatus,
};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentRepository;

/// Appointment storage. Implementations must reject a write that would put two
/// non-cancelled appointments on the same clinic/doctor/date/time with
/// `AppointmentError::SlotNotAvailable`.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn get_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Option<Appointment>, AppointmentError>;

    async fn list_appointments(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn insert_appointment(&self, appointment: Appointment, auth_token: &str) -> Result<Appointment, AppointmentError>;

    /// Writes `status` and `cancellation_reason` from `appointment` only while
    /// the stored status is still `expected`; otherwise `InvalidState`.
    async fn update_appointment_status(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError>;

    /// Copies the schedule fields named by `changed` from `target` onto the
    /// stored appointment. Refused with `InvalidState` once it is cancelled or
    /// completed.
    async fn reschedule_appointment(
        &self,
        target: &Appointment,
        changed: &ChangeDeltas,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError>;
}

#[async_trait]
pub trait ChangeRequestRepository: Send + Sync {
    async fn get_change_request(&self, request_id: Uuid, auth_token: &str) -> Result<Option<ChangeRequest>, AppointmentError>;

    /// Oldest first.
    async fn list_change_requests(
        &self,
        appointment_id: Uuid,
        status: Option<ChangeRequestStatus>,
        auth_token: &str,
    ) -> Result<Vec<ChangeRequest>, AppointmentError>;

    async fn insert_change_request(&self, request: ChangeRequest, auth_token: &str) -> Result<ChangeRequest, AppointmentError>;

    /// Resolves a pending request. A request that is no longer pending fails
    /// with `InvalidState`, so concurrent resolutions cannot both succeed.
    async fn update_change_request_status(
        &self,
        request_id: Uuid,
        status: ChangeRequestStatus,
        auth_token: &str,
    ) -> Result<ChangeRequest, AppointmentError>;
}
