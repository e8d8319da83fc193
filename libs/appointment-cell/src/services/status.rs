// libs/appointment-cell/src/services/status.rs
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, Party};
use crate::repository::AppointmentRepository;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notification::{NotificationEvent, Notifier};

/// Reads appointments and moves them through the status machine.
pub struct StatusService {
    appointments: Arc<dyn AppointmentRepository>,
    notifier: Arc<dyn Notifier>,
    lifecycle: AppointmentLifecycleService,
}

impl StatusService {
    pub fn new(appointments: Arc<dyn AppointmentRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            appointments,
            notifier,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub async fn get_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment {}", appointment_id);

        self.appointments
            .get_appointment(appointment_id, auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn list_appointments(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.appointments.list_appointments(query, auth_token).await
    }

    /// Applies a strict transition, persists it only if nobody moved the status
    /// in between, then tells the other party.
    pub async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        reason: Option<String>,
        actor: Party,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointment = self.get_appointment(appointment_id, auth_token).await?;
        let previous = appointment.status;

        self.lifecycle.apply_transition(&mut appointment, new_status, reason)?;

        let updated = self
            .appointments
            .update_appointment_status(&appointment, previous, auth_token)
            .await?;
        info!("Appointment {} is now {} (by {})", updated.id, updated.status, actor);

        self.notifier.publish(NotificationEvent::status_changed(&updated, actor, updated.status));

        Ok(updated)
    }
}
