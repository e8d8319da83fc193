use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Clinic, ClinicError, StaffMember, StaffRole, WorkingHours};
use crate::repository::ClinicRepository;

/// Process-local clinic storage used for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryClinicStore {
    clinics: Arc<RwLock<HashMap<Uuid, Clinic>>>,
    staff: Arc<RwLock<HashMap<Uuid, StaffMember>>>,
}

impl InMemoryClinicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_clinic(&self, clinic: Clinic) {
        self.clinics.write().await.insert(clinic.id, clinic);
    }

    pub async fn put_staff(&self, staff: StaffMember) {
        self.staff.write().await.insert(staff.id, staff);
    }
}

#[async_trait]
impl ClinicRepository for InMemoryClinicStore {
    async fn get_clinic(&self, clinic_id: Uuid, _auth_token: &str) -> Result<Option<Clinic>, ClinicError> {
        Ok(self.clinics.read().await.get(&clinic_id).cloned())
    }

    async fn get_working_hours(&self, clinic_id: Uuid, _auth_token: &str) -> Result<Vec<WorkingHours>, ClinicError> {
        self.clinics
            .read()
            .await
            .get(&clinic_id)
            .map(|clinic| clinic.working_hours.clone())
            .ok_or(ClinicError::NotFound)
    }

    async fn replace_working_hours(
        &self,
        clinic_id: Uuid,
        hours: Vec<WorkingHours>,
        _auth_token: &str,
    ) -> Result<Vec<WorkingHours>, ClinicError> {
        let mut clinics = self.clinics.write().await;
        let clinic = clinics.get_mut(&clinic_id).ok_or(ClinicError::NotFound)?;
        clinic.working_hours = hours;
        clinic.updated_at = Some(Utc::now());
        Ok(clinic.working_hours.clone())
    }

    async fn list_staff(&self, clinic_id: Uuid, _auth_token: &str) -> Result<Vec<StaffMember>, ClinicError> {
        let mut staff: Vec<StaffMember> = self
            .staff
            .read()
            .await
            .values()
            .filter(|member| member.clinic_id == clinic_id)
            .cloned()
            .collect();
        staff.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(staff)
    }

    async fn get_staff(&self, staff_id: Uuid, _auth_token: &str) -> Result<Option<StaffMember>, ClinicError> {
        Ok(self.staff.read().await.get(&staff_id).cloned())
    }

    async fn insert_staff(&self, staff: StaffMember, _auth_token: &str) -> Result<StaffMember, ClinicError> {
        if !self.clinics.read().await.contains_key(&staff.clinic_id) {
            return Err(ClinicError::NotFound);
        }
        self.staff.write().await.insert(staff.id, staff.clone());
        Ok(staff)
    }

    async fn update_staff_role(&self, staff_id: Uuid, role: StaffRole, _auth_token: &str) -> Result<(), ClinicError> {
        let mut staff = self.staff.write().await;
        let member = staff.get_mut(&staff_id).ok_or(ClinicError::StaffNotFound)?;
        member.role = Some(role);
        Ok(())
    }
}
