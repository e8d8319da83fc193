use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, ChangeDeltas,
    ChangeRequest, ChangeRequestStatus,
};
use crate::repository::{AppointmentRepository, ChangeRequestRepository};

/// Process-local storage for appointments and change requests. Enforces the
/// one-booking-per-slot rule the way a unique index would.
#[derive(Clone, Default)]
pub struct InMemoryAppointmentStore {
    appointments: Arc<RwLock<HashMap<Uuid, Appointment>>>,
    change_requests: Arc<RwLock<HashMap<Uuid, ChangeRequest>>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn appointment_count(&self) -> usize {
        self.appointments.read().await.len()
    }
}

fn ensure_slot_free(
    existing: &HashMap<Uuid, Appointment>,
    candidate: &Appointment,
) -> Result<(), AppointmentError> {
    if existing.values().any(|other| other.collides_with(candidate)) {
        return Err(AppointmentError::SlotNotAvailable);
    }
    Ok(())
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentStore {
    async fn get_appointment(&self, appointment_id: Uuid, _auth_token: &str) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.read().await.get(&appointment_id).cloned())
    }

    async fn list_appointments(
        &self,
        query: &AppointmentSearchQuery,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut matching: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (a.date, &a.time).cmp(&(b.date, &b.time)));

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let limit = query.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_appointment(&self, appointment: Appointment, _auth_token: &str) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        ensure_slot_free(&appointments, &appointment)?;
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_appointment_status(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
        _auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        let stored = appointments
            .get_mut(&appointment.id)
            .ok_or(AppointmentError::NotFound)?;
        if stored.status != expected {
            return Err(AppointmentError::InvalidState(format!(
                "Appointment is already {}",
                stored.status
            )));
        }

        stored.status = appointment.status;
        stored.cancellation_reason = appointment.cancellation_reason.clone();
        stored.updated_at = Some(appointment.updated_at.unwrap_or_else(Utc::now));
        Ok(stored.clone())
    }

    async fn reschedule_appointment(
        &self,
        target: &Appointment,
        changed: &ChangeDeltas,
        _auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        let stored = appointments
            .get(&target.id)
            .ok_or(AppointmentError::NotFound)?;
        if stored.status.is_terminal() {
            return Err(AppointmentError::InvalidState(format!(
                "Appointment is already {}",
                stored.status
            )));
        }

        let mut rescheduled = stored.clone();
        changed.copy_named_fields(target, &mut rescheduled);
        rescheduled.updated_at = Some(Utc::now());
        ensure_slot_free(&appointments, &rescheduled)?;

        appointments.insert(rescheduled.id, rescheduled.clone());
        Ok(rescheduled)
    }
}

#[async_trait]
impl ChangeRequestRepository for InMemoryAppointmentStore {
    async fn get_change_request(&self, request_id: Uuid, _auth_token: &str) -> Result<Option<ChangeRequest>, AppointmentError> {
        Ok(self.change_requests.read().await.get(&request_id).cloned())
    }

    async fn list_change_requests(
        &self,
        appointment_id: Uuid,
        status: Option<ChangeRequestStatus>,
        _auth_token: &str,
    ) -> Result<Vec<ChangeRequest>, AppointmentError> {
        let mut requests: Vec<ChangeRequest> = self
            .change_requests
            .read()
            .await
            .values()
            .filter(|r| r.appointment_id == appointment_id)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn insert_change_request(&self, request: ChangeRequest, _auth_token: &str) -> Result<ChangeRequest, AppointmentError> {
        self.change_requests.write().await.insert(request.id, request.clone());
        Ok(request)
    }

    async fn update_change_request_status(
        &self,
        request_id: Uuid,
        status: ChangeRequestStatus,
        _auth_token: &str,
    ) -> Result<ChangeRequest, AppointmentError> {
        let mut requests = self.change_requests.write().await;
        let request = requests
            .get_mut(&request_id)
            .ok_or(AppointmentError::ChangeRequestNotFound)?;
        if !request.is_pending() {
            return Err(AppointmentError::InvalidState(format!(
                "Change request is already {}",
                request.status
            )));
        }
        request.status = status;
        request.updated_at = Some(Utc::now());
        Ok(request.clone())
    }
}
