// libs/clinic-cell/src/repository/mod.rs
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Clinic, ClinicError, StaffMember, StaffRole, WorkingHours};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryClinicStore;
pub use supabase::SupabaseClinicRepository;

/// Storage for clinics, their weekly schedule and their staff. Every call
/// carries the caller's bearer token so row-level security applies.
#[async_trait]
pub trait ClinicRepository: Send + Sync {
    async fn get_clinic(&self, clinic_id: Uuid, auth_token: &str) -> Result<Option<Clinic>, ClinicError>;

    async fn get_working_hours(&self, clinic_id: Uuid, auth_token: &str) -> Result<Vec<WorkingHours>, ClinicError>;

    async fn replace_working_hours(
        &self,
        clinic_id: Uuid,
        hours: Vec<WorkingHours>,
        auth_token: &str,
    ) -> Result<Vec<WorkingHours>, ClinicError>;

    async fn list_staff(&self, clinic_id: Uuid, auth_token: &str) -> Result<Vec<StaffMember>, ClinicError>;

    async fn get_staff(&self, staff_id: Uuid, auth_token: &str) -> Result<Option<StaffMember>, ClinicError>;

    async fn insert_staff(&self, staff: StaffMember, auth_token: &str) -> Result<StaffMember, ClinicError>;

    async fn update_staff_role(
        &self,
        staff_id: Uuid,
        role: StaffRole,
        auth_token: &str,
    ) -> Result<(), ClinicError>;
}
