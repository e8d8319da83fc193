// libs/appointment-cell/src/services/change_request.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use clinic_cell::{normalize_clock, ClinicRepository};

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, ChangeDeltas, ChangeRequest,
    ChangeRequestResolution, ChangeRequestStatus, Party,
};
use crate::repository::{AppointmentRepository, ChangeRequestRepository};
use crate::services::availability::AvailabilityCalculator;
use crate::services::booking::ensure_bookable_doctor;
use crate::services::notification::{NotificationEvent, Notifier};

/// Proposals from one party to change an appointment, resolved by the other.
pub struct ChangeRequestService {
    appointments: Arc<dyn AppointmentRepository>,
    change_requests: Arc<dyn ChangeRequestRepository>,
    clinics: Arc<dyn ClinicRepository>,
    notifier: Arc<dyn Notifier>,
    calculator: AvailabilityCalculator,
}

impl ChangeRequestService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        change_requests: Arc<dyn ChangeRequestRepository>,
        clinics: Arc<dyn ClinicRepository>,
        notifier: Arc<dyn Notifier>,
        calculator: AvailabilityCalculator,
    ) -> Self {
        Self {
            appointments,
            change_requests,
            clinics,
            notifier,
            calculator,
        }
    }

    /// Records a proposal from `requested_by`. The proposed schedule must be
    /// bookable right now; `today` bounds how early a new date may be.
    pub async fn create_change_request(
        &self,
        appointment_id: Uuid,
        requested_by: Party,
        requester_id: &str,
        deltas: ChangeDeltas,
        reason: Option<String>,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<ChangeRequest, AppointmentError> {
        info!("{} {} requests a change to appointment {}", requested_by, requester_id, appointment_id);

        let appointment = self.load_appointment(appointment_id, auth_token).await?;
        if !appointment.can_request_change() {
            return Err(AppointmentError::InvalidState(format!(
                "Cannot change a {} appointment",
                appointment.status
            )));
        }

        let deltas = normalize_deltas(deltas)?;
        if let Some(new_date) = deltas.new_date {
            if new_date < today {
                return Err(AppointmentError::ValidationError(
                    "Cannot move an appointment into the past".to_string(),
                ));
            }
        }

        let pending = self
            .change_requests
            .list_change_requests(appointment_id, Some(ChangeRequestStatus::Pending), auth_token)
            .await?;
        if pending.iter().any(|r| r.requested_by == requested_by) {
            return Err(AppointmentError::InvalidState(format!(
                "A pending change request from the {} already exists",
                requested_by
            )));
        }

        self.ensure_bookable(&appointment, &deltas, auth_token).await?;

        let request = ChangeRequest {
            id: Uuid::new_v4(),
            appointment_id,
            requested_by,
            requester_id: requester_id.to_string(),
            deltas,
            reason: reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            status: ChangeRequestStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
        };

        let created = self.change_requests.insert_change_request(request, auth_token).await?;
        self.notifier.publish(NotificationEvent::change_requested(&appointment, &created));

        Ok(created)
    }

    /// Applies the request's deltas and marks it approved. Either both writes
    /// persist or neither does.
    pub async fn approve_change_request(
        &self,
        request_id: Uuid,
        auth_token: &str,
    ) -> Result<ChangeRequestResolution, AppointmentError> {
        let request = self.load_pending(request_id, auth_token).await?;

        let original = self.load_appointment(request.appointment_id, auth_token).await?;
        if !original.can_request_change() {
            return Err(AppointmentError::InvalidState(format!(
                "Appointment is already {}",
                original.status
            )));
        }

        // The schedule or the bookings may have moved since the request was made
        let changed = self.ensure_bookable(&original, &request.deltas, auth_token).await?;

        let appointment = self
            .appointments
            .reschedule_appointment(&changed, &request.deltas, auth_token)
            .await?;

        let change_request = match self
            .change_requests
            .update_change_request_status(request_id, ChangeRequestStatus::Approved, auth_token)
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                warn!("Marking change request {} approved failed, restoring appointment: {}", request_id, err);
                if let Err(restore_err) = self
                    .appointments
                    .reschedule_appointment(&original, &request.deltas, auth_token)
                    .await
                {
                    error!("Failed to restore appointment {}: {}", original.id, restore_err);
                }
                return Err(err);
            }
        };

        info!("Change request {} approved", request_id);
        self.notifier.publish(NotificationEvent::change_resolved(&appointment, &change_request, true));

        Ok(ChangeRequestResolution {
            change_request,
            appointment,
        })
    }

    pub async fn reject_change_request(&self, request_id: Uuid, auth_token: &str) -> Result<ChangeRequest, AppointmentError> {
        let request = self.load_pending(request_id, auth_token).await?;
        let appointment = self.load_appointment(request.appointment_id, auth_token).await?;

        let rejected = self
            .change_requests
            .update_change_request_status(request_id, ChangeRequestStatus::Rejected, auth_token)
            .await?;

        info!("Change request {} rejected", request_id);
        self.notifier.publish(NotificationEvent::change_resolved(&appointment, &rejected, false));

        Ok(rejected)
    }

    pub async fn get_change_request(&self, request_id: Uuid, auth_token: &str) -> Result<ChangeRequest, AppointmentError> {
        self.change_requests
            .get_change_request(request_id, auth_token)
            .await?
            .ok_or(AppointmentError::ChangeRequestNotFound)
    }

    /// The newest pending request raised by the other side, i.e. the one
    /// `viewer` is expected to answer.
    pub async fn pending_change_request_for_viewer(
        &self,
        appointment_id: Uuid,
        viewer: Party,
        auth_token: &str,
    ) -> Result<Option<ChangeRequest>, AppointmentError> {
        let pending = self
            .change_requests
            .list_change_requests(appointment_id, Some(ChangeRequestStatus::Pending), auth_token)
            .await?;

        Ok(pending
            .into_iter()
            .rev()
            .find(|r| r.requested_by == viewer.opposite()))
    }

    pub async fn list_change_requests(&self, appointment_id: Uuid, auth_token: &str) -> Result<Vec<ChangeRequest>, AppointmentError> {
        self.change_requests
            .list_change_requests(appointment_id, None, auth_token)
            .await
    }

    /// `appointment` with `deltas` applied, provided the result could be
    /// booked: the doctor belongs to the clinic and offers the service, and the
    /// new slot is on the clinic's grid and free of other bookings.
    async fn ensure_bookable(
        &self,
        appointment: &Appointment,
        deltas: &ChangeDeltas,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut changed = appointment.clone();
        deltas.apply_to(&mut changed);

        let clinic = self
            .clinics
            .get_clinic(changed.clinic_id, auth_token)
            .await?
            .ok_or(AppointmentError::ClinicNotFound)?;

        if let Some(doctor_id) = changed.doctor_id {
            if deltas.new_doctor_id.is_some() || deltas.new_service.is_some() {
                ensure_bookable_doctor(self.clinics.as_ref(), &clinic, doctor_id, &changed.service, auth_token).await?;
            }
        }

        if deltas.moves_slot() {
            let booked: Vec<Appointment> = self
                .appointments
                .list_appointments(&AppointmentSearchQuery::for_clinic_on(clinic.id, changed.date), auth_token)
                .await?
                .into_iter()
                .filter(|other| other.id != changed.id)
                .collect();

            if !self.calculator.is_slot_available(changed.date, &changed.time, &clinic.working_hours, &booked, changed.doctor_id) {
                debug!("Proposed slot {} {} is not bookable at clinic {}", changed.date, changed.time, clinic.id);
                return Err(AppointmentError::SlotNotAvailable);
            }
        }

        Ok(changed)
    }

    async fn load_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get_appointment(appointment_id, auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    async fn load_pending(&self, request_id: Uuid, auth_token: &str) -> Result<ChangeRequest, AppointmentError> {
        let request = self.get_change_request(request_id, auth_token).await?;
        if !request.is_pending() {
            debug!("Change request {} already {}", request_id, request.status);
            return Err(AppointmentError::InvalidState(format!(
                "Change request is already {}",
                request.status
            )));
        }
        Ok(request)
    }
}

fn normalize_deltas(deltas: ChangeDeltas) -> Result<ChangeDeltas, AppointmentError> {
    let new_time = match deltas.new_time {
        Some(time) => Some(normalize_clock(&time).ok_or_else(|| {
            AppointmentError::ValidationError(format!("Invalid time: {}", time))
        })?),
        None => None,
    };

    let new_service = match deltas.new_service {
        Some(service) if service.trim().is_empty() => {
            return Err(AppointmentError::ValidationError("Service cannot be empty".to_string()));
        }
        other => other.map(|s| s.trim().to_string()),
    };

    let normalized = ChangeDeltas {
        new_time,
        new_service,
        ..deltas
    };

    if normalized.is_empty() {
        return Err(AppointmentError::ValidationError(
            "A change request must propose at least one change".to_string(),
        ));
    }

    Ok(normalized)
}
