// libs/appointment-cell/src/services/lifecycle.rs
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, StatusAction};

/// Transition table for appointments:
/// `pending -> confirmed -> completed`, with `cancelled` reachable from
/// `pending` or `confirmed`. `completed` and `cancelled` are terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: *current_status,
                to: *new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    pub fn available_actions(&self, current_status: &AppointmentStatus) -> Vec<StatusAction> {
        [StatusAction::Confirm, StatusAction::Cancel, StatusAction::Complete]
            .into_iter()
            .filter(|action| self.get_valid_transitions(current_status).contains(&action.target_status()))
            .collect()
    }

    /// Moves the appointment to `new_status` in place. The cancellation reason is
    /// recorded only when cancelling; other transitions leave it untouched.
    pub fn apply_transition(
        &self,
        appointment: &mut Appointment,
        new_status: AppointmentStatus,
        reason: Option<String>,
    ) -> Result<(), AppointmentError> {
        self.validate_status_transition(&appointment.status, &new_status)?;

        if new_status == AppointmentStatus::Cancelled {
            appointment.cancellation_reason = reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty());
        }

        info!("Appointment {} {} -> {}", appointment.id, appointment.status, new_status);
        appointment.status = new_status;
        appointment.updated_at = Some(Utc::now());
        Ok(())
    }

    pub fn confirm(&self, appointment: &mut Appointment) -> Result<(), AppointmentError> {
        self.apply_transition(appointment, StatusAction::Confirm.target_status(), None)
    }

    pub fn cancel(&self, appointment: &mut Appointment, reason: Option<String>) -> Result<(), AppointmentError> {
        self.apply_transition(appointment, StatusAction::Cancel.target_status(), reason)
    }

    pub fn complete(&self, appointment: &mut Appointment) -> Result<(), AppointmentError> {
        self.apply_transition(appointment, StatusAction::Complete.target_status(), None)
    }
}
