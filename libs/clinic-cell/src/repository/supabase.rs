use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Clinic, ClinicError, StaffMember, StaffRole, WorkingHours};
use crate::repository::ClinicRepository;

/// PostgREST-backed clinic storage. The weekly schedule lives in the
/// `clinics.working_hours` jsonb column.
pub struct SupabaseClinicRepository {
    supabase: SupabaseClient,
}

impl SupabaseClinicRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn first_row<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>, ClinicError> {
        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| ClinicError::DatabaseError(e.to_string())),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ClinicRepository for SupabaseClinicRepository {
    async fn get_clinic(&self, clinic_id: Uuid, auth_token: &str) -> Result<Option<Clinic>, ClinicError> {
        debug!("Fetching clinic {}", clinic_id);

        let path = format!("/rest/v1/clinics?id=eq.{}", clinic_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Self::first_row(rows)
    }

    async fn get_working_hours(&self, clinic_id: Uuid, auth_token: &str) -> Result<Vec<WorkingHours>, ClinicError> {
        self.get_clinic(clinic_id, auth_token)
            .await?
            .map(|clinic| clinic.working_hours)
            .ok_or(ClinicError::NotFound)
    }

    async fn replace_working_hours(
        &self,
        clinic_id: Uuid,
        hours: Vec<WorkingHours>,
        auth_token: &str,
    ) -> Result<Vec<WorkingHours>, ClinicError> {
        debug!("Replacing working hours for clinic {}", clinic_id);

        let path = format!("/rest/v1/clinics?id=eq.{}", clinic_id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({
                "working_hours": hours,
                "updated_at": Utc::now().to_rfc3339()
            })),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Self::first_row::<Clinic>(rows)?
            .map(|clinic| clinic.working_hours)
            .ok_or(ClinicError::NotFound)
    }

    async fn list_staff(&self, clinic_id: Uuid, auth_token: &str) -> Result<Vec<StaffMember>, ClinicError> {
        debug!("Listing staff for clinic {}", clinic_id);

        let path = format!("/rest/v1/clinic_staff?clinic_id=eq.{}&order=name.asc", clinic_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<StaffMember>, _>>()
            .map_err(|e| ClinicError::DatabaseError(e.to_string()))
    }

    async fn get_staff(&self, staff_id: Uuid, auth_token: &str) -> Result<Option<StaffMember>, ClinicError> {
        let path = format!("/rest/v1/clinic_staff?id=eq.{}", staff_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Self::first_row(rows)
    }

    async fn insert_staff(&self, staff: StaffMember, auth_token: &str) -> Result<StaffMember, ClinicError> {
        let body = serde_json::to_value(&staff)
            .map_err(|e| ClinicError::DatabaseError(e.to_string()))?;

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/clinic_staff",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Self::first_row(rows)?
            .ok_or_else(|| ClinicError::DatabaseError("Failed to create staff member".to_string()))
    }

    async fn update_staff_role(&self, staff_id: Uuid, role: StaffRole, auth_token: &str) -> Result<(), ClinicError> {
        let path = format!("/rest/v1/clinic_staff?id=eq.{}", staff_id);
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "role": role })),
            Some(SupabaseClient::return_representation()),
        ).await?;

        if rows.is_empty() {
            return Err(ClinicError::StaffNotFound);
        }
        Ok(())
    }
}
