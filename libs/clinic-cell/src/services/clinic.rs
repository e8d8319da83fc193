// libs/clinic-cell/src/services/clinic.rs
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    parse_weekday, Clinic, ClinicError, CreateStaffRequest, StaffMember, WorkingHours, WEEK,
};
use crate::repository::ClinicRepository;

pub struct ClinicService {
    repository: Arc<dyn ClinicRepository>,
}

impl ClinicService {
    pub fn new(repository: Arc<dyn ClinicRepository>) -> Self {
        Self { repository }
    }

    pub async fn get_clinic(&self, clinic_id: Uuid, auth_token: &str) -> Result<Clinic, ClinicError> {
        debug!("Loading clinic {}", clinic_id);
        self.repository
            .get_clinic(clinic_id, auth_token)
            .await?
            .ok_or(ClinicError::NotFound)
    }

    pub async fn get_working_hours(&self, clinic_id: Uuid, auth_token: &str) -> Result<Vec<WorkingHours>, ClinicError> {
        self.repository.get_working_hours(clinic_id, auth_token).await
    }

    /// Validates every entry, rejects duplicate days, and stores the schedule
    /// ordered Monday to Sunday.
    pub async fn replace_working_hours(
        &self,
        clinic_id: Uuid,
        mut hours: Vec<WorkingHours>,
        auth_token: &str,
    ) -> Result<Vec<WorkingHours>, ClinicError> {
        let mut seen = HashSet::new();
        for entry in &hours {
            entry.validate()?;
            let day = parse_weekday(&entry.day)
                .ok_or_else(|| ClinicError::ValidationError(format!("Unknown day '{}'", entry.day)))?;
            if !seen.insert(day) {
                return Err(ClinicError::ValidationError(format!("Duplicate entry for {}", entry.day)));
            }
        }

        if seen.len() < WEEK.len() {
            warn!("Clinic {} schedule covers {} of 7 days; missing days are treated as closed", clinic_id, seen.len());
        }

        hours.sort_by_key(|entry| {
            parse_weekday(&entry.day)
                .and_then(|day| WEEK.iter().position(|d| *d == day))
                .unwrap_or(WEEK.len())
        });

        let stored = self.repository.replace_working_hours(clinic_id, hours, auth_token).await?;
        info!("Working hours updated for clinic {}", clinic_id);
        Ok(stored)
    }

    pub async fn list_staff(&self, clinic_id: Uuid, auth_token: &str) -> Result<Vec<StaffMember>, ClinicError> {
        self.repository.list_staff(clinic_id, auth_token).await
    }

    pub async fn list_doctors(&self, clinic_id: Uuid, auth_token: &str) -> Result<Vec<StaffMember>, ClinicError> {
        let staff = self.repository.list_staff(clinic_id, auth_token).await?;
        Ok(staff.into_iter().filter(StaffMember::is_bookable_doctor).collect())
    }

    pub async fn get_staff(&self, staff_id: Uuid, auth_token: &str) -> Result<StaffMember, ClinicError> {
        self.repository
            .get_staff(staff_id, auth_token)
            .await?
            .ok_or(ClinicError::StaffNotFound)
    }

    pub async fn add_staff(
        &self,
        clinic_id: Uuid,
        request: CreateStaffRequest,
        auth_token: &str,
    ) -> Result<StaffMember, ClinicError> {
        if request.name.trim().is_empty() {
            return Err(ClinicError::ValidationError("Staff name is required".to_string()));
        }
        if request.title.trim().is_empty() {
            return Err(ClinicError::ValidationError("Staff title is required".to_string()));
        }

        let staff = StaffMember {
            id: Uuid::new_v4(),
            clinic_id,
            name: request.name.trim().to_string(),
            title: request.title.trim().to_string(),
            specialty: request.specialty,
            specialties: request.specialties,
            phone: request.phone,
            email: request.email,
            services: request.services,
            role: Some(request.role),
            is_active: true,
        };

        let created = self.repository.insert_staff(staff, auth_token).await?;
        info!("Added {} {} to clinic {}", created.role.map(|r| r.to_string()).unwrap_or_default(), created.id, clinic_id);
        Ok(created)
    }
}
