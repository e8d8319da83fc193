// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use clinic_cell::{normalize_clock, Clinic, ClinicRepository};

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    BookAppointmentRequest, PaymentStatus,
};
use crate::repository::AppointmentRepository;
use crate::services::availability::AvailabilityCalculator;
use crate::services::notification::{NotificationEvent, Notifier};

pub struct BookingService {
    appointments: Arc<dyn AppointmentRepository>,
    clinics: Arc<dyn ClinicRepository>,
    notifier: Arc<dyn Notifier>,
    calculator: AvailabilityCalculator,
}

impl BookingService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        clinics: Arc<dyn ClinicRepository>,
        notifier: Arc<dyn Notifier>,
        calculator: AvailabilityCalculator,
    ) -> Self {
        Self {
            appointments,
            clinics,
            notifier,
            calculator,
        }
    }

    /// Books `request` for `user_id` in the `pending` state. `today` is the
    /// caller's wall-clock date; past dates are rejected.
    pub async fn book_appointment(
        &self,
        user_id: Uuid,
        request: BookAppointmentRequest,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for user {} at clinic {} on {} {}",
              user_id, request.clinic_id, request.date, request.time);

        // **Step 1: Validate input**
        let time = self.validate_request(&request, today)?;

        // **Step 2: Resolve clinic and doctor**
        let clinic = self
            .clinics
            .get_clinic(request.clinic_id, auth_token)
            .await?
            .ok_or(AppointmentError::ClinicNotFound)?;

        if let Some(doctor_id) = request.doctor_id {
            ensure_bookable_doctor(self.clinics.as_ref(), &clinic, doctor_id, &request.service, auth_token).await?;
        }

        // **Step 3: Check the slot is still free**
        let booked = self
            .appointments
            .list_appointments(&AppointmentSearchQuery::for_clinic_on(clinic.id, request.date), auth_token)
            .await?;

        if !self.calculator.is_slot_available(request.date, &time, &clinic.working_hours, &booked, request.doctor_id) {
            warn!("Slot {} {} at clinic {} is not available", request.date, time, clinic.id);
            return Err(AppointmentError::SlotNotAvailable);
        }

        // **Step 4: Snapshot clinic details and persist**
        let appointment = Self::build_appointment(user_id, &clinic, request, time);
        let created = self.appointments.insert_appointment(appointment, auth_token).await?;

        info!("Appointment {} booked", created.id);
        self.notifier.publish(NotificationEvent::appointment_booked(&created));

        Ok(created)
    }

    /// Returns the normalized `HH:MM` time on success.
    fn validate_request(&self, request: &BookAppointmentRequest, today: NaiveDate) -> Result<String, AppointmentError> {
        if request.service.trim().is_empty() {
            return Err(AppointmentError::ValidationError("Service is required".to_string()));
        }

        let time = normalize_clock(&request.time).ok_or_else(|| {
            AppointmentError::ValidationError(format!("Invalid appointment time: {}", request.time))
        })?;

        if request.date < today {
            return Err(AppointmentError::ValidationError(
                "Cannot book appointments in the past".to_string(),
            ));
        }

        if let Some(price) = request.price {
            if !price.is_finite() || price < 0.0 {
                return Err(AppointmentError::ValidationError("Price must be a non-negative amount".to_string()));
            }
        }

        Ok(time)
    }

    fn build_appointment(
        user_id: Uuid,
        clinic: &Clinic,
        request: BookAppointmentRequest,
        time: String,
    ) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            user_id,
            clinic_id: clinic.id,
            doctor_id: request.doctor_id,
            clinic_name: clinic.name.clone(),
            clinic_address: clinic.address.clone(),
            clinic_phone: clinic.phone.clone(),
            clinic_email: clinic.email.clone(),
            service: request.service.trim().to_string(),
            date: request.date,
            time,
            notes: request.notes,
            complaint: request.complaint,
            urgent: request.urgent,
            price: request.price,
            payment_status: request.price.map(|_| PaymentStatus::Pending),
            status: AppointmentStatus::Pending,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// The doctor must be an active doctor of `clinic` who offers `service`.
pub(crate) async fn ensure_bookable_doctor(
    clinics: &dyn ClinicRepository,
    clinic: &Clinic,
    doctor_id: Uuid,
    service: &str,
    auth_token: &str,
) -> Result<(), AppointmentError> {
    debug!("Validating doctor {} for clinic {}", doctor_id, clinic.id);

    let doctor = clinics
        .get_staff(doctor_id, auth_token)
        .await?
        .filter(|staff| staff.clinic_id == clinic.id && staff.is_bookable_doctor())
        .ok_or(AppointmentError::DoctorNotFound)?;

    if !doctor.provides(service) {
        return Err(AppointmentError::ValidationError(format!(
            "{} does not provide {}",
            doctor.name, service
        )));
    }

    Ok(())
}
