// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::{debug, warn};
use uuid::Uuid;

use clinic_cell::{find_working_hours, format_clock, parse_clock_minutes, ClinicRepository, WorkingHours};
use shared_config::DEFAULT_SLOT_INTERVAL_MINUTES;

use crate::models::{Appointment, AppointmentError, AppointmentSearchQuery};
use crate::repository::AppointmentRepository;

/// Pure slot arithmetic over a weekly schedule. Times are whole minutes of the
/// clinic's local wall clock; nothing here reads the system clock.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityCalculator {
    slot_interval_minutes: u32,
}

impl Default for AvailabilityCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT_INTERVAL_MINUTES)
    }
}

impl AvailabilityCalculator {
    pub fn new(slot_interval_minutes: u32) -> Self {
        Self {
            slot_interval_minutes: slot_interval_minutes.max(1),
        }
    }

    pub fn slot_interval_minutes(&self) -> u32 {
        self.slot_interval_minutes
    }

    /// Every day in `[from_date, from_date + horizon_days]` whose weekday has an
    /// open, well-formed working-hours entry, ascending.
    pub fn list_available_dates(
        &self,
        working_hours: &[WorkingHours],
        horizon_days: u32,
        from_date: NaiveDate,
    ) -> Vec<NaiveDate> {
        (0..=i64::from(horizon_days))
            .map_while(|offset| from_date.checked_add_signed(Duration::days(offset)))
            .filter(|date| open_window(working_hours, *date).is_some())
            .collect()
    }

    /// Free `HH:MM` slots on `date`. A slot is taken by any non-cancelled
    /// appointment at that date and time; with `doctor_id` only that doctor's
    /// appointments count.
    pub fn list_available_time_slots(
        &self,
        date: NaiveDate,
        working_hours: &[WorkingHours],
        existing_appointments: &[Appointment],
        doctor_id: Option<Uuid>,
    ) -> Vec<String> {
        let Some((open, close)) = open_window(working_hours, date) else {
            return Vec::new();
        };

        let taken: Vec<u32> = existing_appointments
            .iter()
            .filter(|a| a.date == date && a.occupies_slot())
            .filter(|a| doctor_id.map_or(true, |id| a.doctor_id == Some(id)))
            .filter_map(|a| parse_clock_minutes(&a.time))
            .collect();

        (open..close)
            .step_by(self.slot_interval_minutes as usize)
            .filter(|minute| !taken.contains(minute))
            .map(format_clock)
            .collect()
    }

    pub fn is_slot_available(
        &self,
        date: NaiveDate,
        time: &str,
        working_hours: &[WorkingHours],
        existing_appointments: &[Appointment],
        doctor_id: Option<Uuid>,
    ) -> bool {
        let Some(wanted) = parse_clock_minutes(time) else {
            return false;
        };
        self.list_available_time_slots(date, working_hours, existing_appointments, doctor_id)
            .iter()
            .any(|slot| parse_clock_minutes(slot) == Some(wanted))
    }
}

/// Open/close minutes for the weekday of `date`; `None` when the day is closed,
/// missing from the schedule, or its entry is malformed.
fn open_window(working_hours: &[WorkingHours], date: NaiveDate) -> Option<(u32, u32)> {
    let entry = find_working_hours(working_hours, date.weekday())?;
    if entry.closed {
        return None;
    }
    let window = entry.window_minutes();
    if window.is_none() {
        warn!(
            "Skipping malformed working hours for {}: {} - {}",
            entry.day, entry.open_time, entry.close_time
        );
    }
    window
}

/// Loads a clinic's schedule and bookings and runs the calculator over them.
pub struct AvailabilityService {
    clinics: Arc<dyn ClinicRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    calculator: AvailabilityCalculator,
}

impl AvailabilityService {
    pub fn new(
        clinics: Arc<dyn ClinicRepository>,
        appointments: Arc<dyn AppointmentRepository>,
        calculator: AvailabilityCalculator,
    ) -> Self {
        Self {
            clinics,
            appointments,
            calculator,
        }
    }

    pub async fn available_dates(
        &self,
        clinic_id: Uuid,
        from_date: NaiveDate,
        horizon_days: u32,
        auth_token: &str,
    ) -> Result<Vec<NaiveDate>, AppointmentError> {
        debug!("Listing available dates for clinic {} from {} (+{} days)", clinic_id, from_date, horizon_days);

        let hours = self.clinics.get_working_hours(clinic_id, auth_token).await?;
        Ok(self.calculator.list_available_dates(&hours, horizon_days, from_date))
    }

    pub async fn available_slots(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        doctor_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<String>, AppointmentError> {
        debug!("Calculating available slots for clinic {} on {} (doctor: {:?})", clinic_id, date, doctor_id);

        let hours = self.clinics.get_working_hours(clinic_id, auth_token).await?;
        let booked = self
            .appointments
            .list_appointments(&AppointmentSearchQuery::for_clinic_on(clinic_id, date), auth_token)
            .await?;

        Ok(self.calculator.list_available_time_slots(date, &hours, &booked, doctor_id))
    }
}
