use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, ChangeDeltas,
    ChangeRequest, ChangeRequestStatus,
};
use crate::repository::{AppointmentRepository, ChangeRequestRepository};

const APPOINTMENTS: &str = "/rest/v1/appointments";
const CHANGE_REQUESTS: &str = "/rest/v1/appointment_change_requests";

/// PostgREST-backed storage. The slot uniqueness rule is a partial unique index
/// on `appointments (clinic_id, date, time, coalesce(doctor_id, ...)) where
/// status <> 'cancelled'`; its 409 surfaces as `SlotNotAvailable`.
pub struct SupabaseAppointmentRepository {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, AppointmentError> {
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(AppointmentError::from))
            .collect()
    }

    fn first_row<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>, AppointmentError> {
        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    fn search_path(query: &AppointmentSearchQuery) -> String {
        let mut query_parts = vec![];

        if let Some(clinic_id) = query.clinic_id {
            query_parts.push(format!("clinic_id=eq.{}", clinic_id));
        }
        if let Some(user_id) = query.user_id {
            query_parts.push(format!("user_id=eq.{}", user_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("date=gte.{}", from_date));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("date=lte.{}", to_date));
        }
        query_parts.push("order=date.asc,time.asc".to_string());
        if let Some(limit) = query.limit {
            query_parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = query.offset {
            query_parts.push(format!("offset={}", offset));
        }

        format!("{}?{}", APPOINTMENTS, query_parts.join("&"))
    }

    /// Body for a reschedule PATCH: only the fields `changed` names.
    fn schedule_patch(target: &Appointment, changed: &ChangeDeltas) -> Value {
        let mut fields = Map::new();
        if changed.new_date.is_some() {
            fields.insert("date".to_string(), json!(target.date));
        }
        if changed.new_time.is_some() {
            fields.insert("time".to_string(), json!(target.time));
        }
        if changed.new_doctor_id.is_some() {
            fields.insert("doctor_id".to_string(), json!(target.doctor_id));
        }
        if changed.new_service.is_some() {
            fields.insert("service".to_string(), json!(target.service));
        }
        fields.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        Value::Object(fields)
    }

    async fn patch_rows(&self, path: &str, body: Value, auth_token: &str) -> Result<Vec<Value>, AppointmentError> {
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            path,
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;
        Ok(rows)
    }

    /// A guarded PATCH matched nothing: tell a missing row from one whose
    /// status moved on.
    async fn unmatched_appointment(&self, appointment_id: Uuid, auth_token: &str) -> AppointmentError {
        match self.get_appointment(appointment_id, auth_token).await {
            Ok(Some(current)) => {
                warn!("Appointment {} changed concurrently, now {}", appointment_id, current.status);
                AppointmentError::InvalidState(format!("Appointment is already {}", current.status))
            }
            Ok(None) => AppointmentError::NotFound,
            Err(err) => err,
        }
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn get_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Option<Appointment>, AppointmentError> {
        debug!("Fetching appointment {}", appointment_id);

        let path = format!("{}?id=eq.{}", APPOINTMENTS, appointment_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Self::first_row(rows)
    }

    async fn list_appointments(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = Self::search_path(query);
        debug!("Searching appointments: {}", path);

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Self::parse_rows(rows)
    }

    async fn insert_appointment(&self, appointment: Appointment, auth_token: &str) -> Result<Appointment, AppointmentError> {
        let body = serde_json::to_value(&appointment)?;

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            APPOINTMENTS,
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Self::first_row(rows)?
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))
    }

    async fn update_appointment_status(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("{}?id=eq.{}&status=eq.{}", APPOINTMENTS, appointment.id, expected);
        let update_data = json!({
            "status": appointment.status,
            "cancellation_reason": appointment.cancellation_reason,
            "updated_at": appointment.updated_at.unwrap_or_else(Utc::now),
        });

        let rows = self.patch_rows(&path, update_data, auth_token).await?;
        match Self::first_row(rows)? {
            Some(updated) => Ok(updated),
            None => Err(self.unmatched_appointment(appointment.id, auth_token).await),
        }
    }

    async fn reschedule_appointment(
        &self,
        target: &Appointment,
        changed: &ChangeDeltas,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("{}?id=eq.{}&status=in.(pending,confirmed)", APPOINTMENTS, target.id);
        debug!("Rescheduling appointment {}", target.id);

        let rows = self.patch_rows(&path, Self::schedule_patch(target, changed), auth_token).await?;
        match Self::first_row(rows)? {
            Some(updated) => Ok(updated),
            None => Err(self.unmatched_appointment(target.id, auth_token).await),
        }
    }
}

#[async_trait]
impl ChangeRequestRepository for SupabaseAppointmentRepository {
    async fn get_change_request(&self, request_id: Uuid, auth_token: &str) -> Result<Option<ChangeRequest>, AppointmentError> {
        let path = format!("{}?id=eq.{}", CHANGE_REQUESTS, request_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Self::first_row(rows)
    }

    async fn list_change_requests(
        &self,
        appointment_id: Uuid,
        status: Option<ChangeRequestStatus>,
        auth_token: &str,
    ) -> Result<Vec<ChangeRequest>, AppointmentError> {
        let mut path = format!("{}?appointment_id=eq.{}", CHANGE_REQUESTS, appointment_id);
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        path.push_str("&order=created_at.asc");

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Self::parse_rows(rows)
    }

    async fn insert_change_request(&self, request: ChangeRequest, auth_token: &str) -> Result<ChangeRequest, AppointmentError> {
        let body = serde_json::to_value(&request)?;

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            CHANGE_REQUESTS,
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Self::first_row(rows)?
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create change request".to_string()))
    }

    async fn update_change_request_status(
        &self,
        request_id: Uuid,
        status: ChangeRequestStatus,
        auth_token: &str,
    ) -> Result<ChangeRequest, AppointmentError> {
        let path = format!("{}?id=eq.{}&status=eq.pending", CHANGE_REQUESTS, request_id);
        let body = json!({
            "status": status,
            "updated_at": Utc::now().to_rfc3339()
        });

        let rows = self.patch_rows(&path, body, auth_token).await?;
        if let Some(updated) = Self::first_row(rows)? {
            return Ok(updated);
        }

        match self.get_change_request(request_id, auth_token).await? {
            Some(current) => {
                warn!("Change request {} was already {}", request_id, current.status);
                Err(AppointmentError::InvalidState(format!(
                    "Change request is already {}",
                    current.status
                )))
            }
            None => Err(AppointmentError::ChangeRequestNotFound),
        }
    }
}
