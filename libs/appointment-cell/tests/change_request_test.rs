use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc, Weekday};
use tokio::sync::Barrier;
use uuid::Uuid;

use appointment_cell::models::*;
use appointment_cell::repository::{
    AppointmentRepository, ChangeRequestRepository, InMemoryAppointmentStore,
};
use appointment_cell::services::{
    AvailabilityCalculator, BroadcastNotifier, ChangeRequestService, NotificationKind, Notifier,
};
use clinic_cell::{Clinic, InMemoryClinicStore, StaffMember, StaffRole, WorkingHours, WEEK};

const TOKEN: &str = "test-token";

// Appointments sit on Monday 2024-01-01
fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 12, 28).unwrap()
}

fn clinic(id: Uuid, working_hours: Vec<WorkingHours>) -> Clinic {
    Clinic {
        id,
        name: "Smile Dental".to_string(),
        address: "1 Harbour Street".to_string(),
        phone: Some("+353 1 555 0100".to_string()),
        email: None,
        working_hours,
        is_active: true,
        created_at: Utc::now(),
        updated_at: None,
    }
}

fn weekdays_open() -> Vec<WorkingHours> {
    WEEK.iter()
        .map(|day| match day {
            Weekday::Sat | Weekday::Sun => WorkingHours::closed(*day),
            _ => WorkingHours::open(*day, "09:00", "18:00"),
        })
        .collect()
}

fn doctor(clinic_id: Uuid) -> StaffMember {
    StaffMember {
        id: Uuid::new_v4(),
        clinic_id,
        name: "Dr. Aoife Byrne".to_string(),
        title: "Dentist".to_string(),
        specialty: None,
        specialties: vec![],
        phone: None,
        email: None,
        services: vec![],
        role: Some(StaffRole::Doctor),
        is_active: true,
    }
}

fn time_change(time: &str) -> ChangeDeltas {
    ChangeDeltas {
        new_time: Some(time.to_string()),
        ..ChangeDeltas::default()
    }
}

struct Fixture {
    store: Arc<InMemoryAppointmentStore>,
    clinics: Arc<InMemoryClinicStore>,
    notifier: Arc<BroadcastNotifier>,
    service: ChangeRequestService,
    clinic_id: Uuid,
}

impl Fixture {
    fn appointment(&self, doctor_id: Option<Uuid>, time: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            clinic_id: self.clinic_id,
            doctor_id,
            clinic_name: "Smile Dental".to_string(),
            clinic_address: "1 Harbour Street".to_string(),
            clinic_phone: Some("+353 1 555 0100".to_string()),
            clinic_email: None,
            service: "Filling".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            time: time.to_string(),
            notes: Some("Upper left molar".to_string()),
            complaint: None,
            urgent: false,
            price: Some(80.0),
            payment_status: Some(PaymentStatus::Pending),
            status,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    async fn booked(&self, doctor_id: Option<Uuid>, time: &str, status: AppointmentStatus) -> Appointment {
        self.store
            .insert_appointment(self.appointment(doctor_id, time, status), TOKEN)
            .await
            .unwrap()
    }

    async fn propose(&self, appointment: &Appointment, by: Party, deltas: ChangeDeltas) -> Result<ChangeRequest, AppointmentError> {
        self.service
            .create_change_request(appointment.id, by, "requester", deltas, None, today(), TOKEN)
            .await
    }
}

async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let clinics = Arc::new(InMemoryClinicStore::new());
    let clinic_id = Uuid::new_v4();
    clinics.put_clinic(clinic(clinic_id, weekdays_open())).await;

    let notifier = Arc::new(BroadcastNotifier::new(16));
    let service = ChangeRequestService::new(
        store.clone(),
        store.clone(),
        clinics.clone(),
        notifier.clone(),
        AvailabilityCalculator::default(),
    );
    Fixture { store, clinics, notifier, service, clinic_id }
}

#[tokio::test]
async fn test_approving_time_change_keeps_everything_else() {
    let fx = fixture().await;
    let d1 = doctor(fx.clinic_id);
    fx.clinics.put_staff(d1.clone()).await;
    let original = fx.booked(Some(d1.id), "10:00", AppointmentStatus::Confirmed).await;

    let request = fx.propose(&original, Party::Clinic, time_change("14:00")).await.unwrap();
    assert_eq!(request.status, ChangeRequestStatus::Pending);

    let resolution = fx.service.approve_change_request(request.id, TOKEN).await.unwrap();

    assert_eq!(resolution.change_request.status, ChangeRequestStatus::Approved);
    let updated = resolution.appointment;
    assert_eq!(updated.time, "14:00");
    assert_eq!(updated.doctor_id, Some(d1.id));
    assert_eq!(updated.date, original.date);
    assert_eq!(updated.service, original.service);
    assert_eq!(updated.notes, original.notes);
    assert_eq!(updated.status, original.status);
    assert_eq!(updated.price, original.price);

    let stored = fx.store.get_appointment(original.id, TOKEN).await.unwrap().unwrap();
    assert_eq!(stored.time, "14:00");
}

#[tokio::test]
async fn test_rejection_leaves_appointment_unchanged() {
    let fx = fixture().await;
    let original = fx.booked(None, "10:00", AppointmentStatus::Pending).await;

    let deltas = ChangeDeltas {
        new_date: NaiveDate::from_ymd_opt(2024, 1, 3),
        new_service: Some("Whitening".to_string()),
        ..ChangeDeltas::default()
    };
    let request = fx
        .service
        .create_change_request(
            original.id,
            Party::User,
            &original.user_id.to_string(),
            deltas,
            Some("Travelling".to_string()),
            today(),
            TOKEN,
        )
        .await
        .unwrap();

    let rejected = fx.service.reject_change_request(request.id, TOKEN).await.unwrap();
    assert_eq!(rejected.status, ChangeRequestStatus::Rejected);

    let stored = fx.store.get_appointment(original.id, TOKEN).await.unwrap().unwrap();
    assert_eq!(stored, original);
}

#[tokio::test]
async fn test_resolved_request_cannot_be_resolved_again() {
    let fx = fixture().await;
    let original = fx.booked(None, "10:00", AppointmentStatus::Pending).await;
    let request = fx.propose(&original, Party::Clinic, time_change("11:00")).await.unwrap();

    fx.service.reject_change_request(request.id, TOKEN).await.unwrap();

    assert_matches!(
        fx.service.approve_change_request(request.id, TOKEN).await,
        Err(AppointmentError::InvalidState(_))
    );
    assert_matches!(
        fx.service.reject_change_request(request.id, TOKEN).await,
        Err(AppointmentError::InvalidState(_))
    );
}

#[tokio::test]
async fn test_cannot_request_change_on_terminal_appointment() {
    let fx = fixture().await;
    for status in [AppointmentStatus::Cancelled, AppointmentStatus::Completed] {
        let stored = fx.booked(None, "10:00", status).await;
        assert_matches!(
            fx.propose(&stored, Party::User, time_change("11:00")).await,
            Err(AppointmentError::InvalidState(_))
        );
    }
}

#[tokio::test]
async fn test_approval_fails_once_appointment_is_cancelled() {
    let fx = fixture().await;
    let original = fx.booked(None, "10:00", AppointmentStatus::Pending).await;
    let request = fx.propose(&original, Party::User, time_change("15:00")).await.unwrap();

    let cancelled = Appointment {
        status: AppointmentStatus::Cancelled,
        ..original.clone()
    };
    fx.store
        .update_appointment_status(&cancelled, AppointmentStatus::Pending, TOKEN)
        .await
        .unwrap();

    assert_matches!(
        fx.service.approve_change_request(request.id, TOKEN).await,
        Err(AppointmentError::InvalidState(_))
    );
    let still_pending = fx.service.get_change_request(request.id, TOKEN).await.unwrap();
    assert!(still_pending.is_pending());
}

#[tokio::test]
async fn test_create_validates_deltas() {
    let fx = fixture().await;
    let stored = fx.booked(None, "10:00", AppointmentStatus::Pending).await;

    assert_matches!(
        fx.propose(&stored, Party::User, ChangeDeltas::default()).await,
        Err(AppointmentError::ValidationError(_))
    );
    assert_matches!(
        fx.propose(&stored, Party::User, time_change("25:00")).await,
        Err(AppointmentError::ValidationError(_))
    );

    let missing = fx.appointment(None, "10:00", AppointmentStatus::Pending);
    assert_matches!(
        fx.propose(&missing, Party::User, time_change("11:00")).await,
        Err(AppointmentError::NotFound)
    );
}

#[tokio::test]
async fn test_proposal_must_be_bookable() {
    let fx = fixture().await;
    let stored = fx.booked(None, "10:00", AppointmentStatus::Confirmed).await;

    let into_the_past = ChangeDeltas {
        new_date: NaiveDate::from_ymd_opt(2023, 12, 27),
        ..ChangeDeltas::default()
    };
    assert_matches!(
        fx.propose(&stored, Party::User, into_the_past).await,
        Err(AppointmentError::ValidationError(_))
    );

    let onto_sunday = ChangeDeltas {
        new_date: NaiveDate::from_ymd_opt(2024, 1, 7),
        ..ChangeDeltas::default()
    };
    assert_matches!(
        fx.propose(&stored, Party::User, onto_sunday).await,
        Err(AppointmentError::SlotNotAvailable)
    );

    for time in ["03:17", "10:17", "18:00"] {
        assert_matches!(
            fx.propose(&stored, Party::User, time_change(time)).await,
            Err(AppointmentError::SlotNotAvailable)
        );
    }

    let elsewhere = doctor(Uuid::new_v4());
    fx.clinics.put_staff(elsewhere.clone()).await;
    let foreign_doctor = ChangeDeltas {
        new_doctor_id: Some(elsewhere.id),
        ..ChangeDeltas::default()
    };
    assert_matches!(
        fx.propose(&stored, Party::User, foreign_doctor).await,
        Err(AppointmentError::DoctorNotFound)
    );

    assert!(fx.service.list_change_requests(stored.id, TOKEN).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_keeping_own_slot_is_not_a_conflict() {
    let fx = fixture().await;
    let stored = fx.booked(None, "10:00", AppointmentStatus::Pending).await;

    let deltas = ChangeDeltas {
        new_time: Some("10:00".to_string()),
        new_service: Some("Cleaning".to_string()),
        ..ChangeDeltas::default()
    };
    let request = fx.propose(&stored, Party::Clinic, deltas).await.unwrap();
    let resolution = fx.service.approve_change_request(request.id, TOKEN).await.unwrap();

    assert_eq!(resolution.appointment.time, "10:00");
    assert_eq!(resolution.appointment.service, "Cleaning");
}

#[tokio::test]
async fn test_approval_rechecks_clinic_schedule() {
    let fx = fixture().await;
    let stored = fx.booked(None, "10:00", AppointmentStatus::Confirmed).await;
    let request = fx.propose(&stored, Party::User, time_change("17:00")).await.unwrap();

    // The clinic shortens Mondays after the proposal was made
    let mut hours = weekdays_open();
    hours[0] = WorkingHours::open(Weekday::Mon, "09:00", "13:00");
    fx.clinics.put_clinic(clinic(fx.clinic_id, hours)).await;

    assert_matches!(
        fx.service.approve_change_request(request.id, TOKEN).await,
        Err(AppointmentError::SlotNotAvailable)
    );
    let unchanged = fx.store.get_appointment(stored.id, TOKEN).await.unwrap().unwrap();
    assert_eq!(unchanged.time, "10:00");
    assert!(fx.service.get_change_request(request.id, TOKEN).await.unwrap().is_pending());
}

#[tokio::test]
async fn test_one_pending_request_per_direction() {
    let fx = fixture().await;
    let stored = fx.booked(None, "10:00", AppointmentStatus::Pending).await;

    fx.propose(&stored, Party::User, time_change("11:00")).await.unwrap();

    assert_matches!(
        fx.propose(&stored, Party::User, time_change("12:00")).await,
        Err(AppointmentError::InvalidState(_))
    );

    // The clinic may still counter-propose
    assert!(fx.propose(&stored, Party::Clinic, time_change("13:00")).await.is_ok());
    assert_eq!(fx.service.list_change_requests(stored.id, TOKEN).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_viewer_sees_request_from_other_party() {
    let fx = fixture().await;
    let stored = fx.booked(None, "10:00", AppointmentStatus::Pending).await;

    let from_clinic = fx.propose(&stored, Party::Clinic, time_change("16:00")).await.unwrap();

    let for_patient = fx
        .service
        .pending_change_request_for_viewer(stored.id, Party::User, TOKEN)
        .await
        .unwrap();
    assert_eq!(for_patient.map(|r| r.id), Some(from_clinic.id));

    let for_clinic = fx
        .service
        .pending_change_request_for_viewer(stored.id, Party::Clinic, TOKEN)
        .await
        .unwrap();
    assert!(for_clinic.is_none());
}

#[tokio::test]
async fn test_notifications_follow_the_request() {
    let fx = fixture().await;
    let mut events = fx.notifier.subscribe();
    let stored = fx.booked(None, "10:00", AppointmentStatus::Confirmed).await;

    let request = fx.propose(&stored, Party::Clinic, time_change("14:00")).await.unwrap();

    let created = events.recv().await.unwrap();
    assert_eq!(created.kind, NotificationKind::ChangeRequested);
    assert_eq!(created.recipient.party, Party::User);
    assert_eq!(created.recipient.id, stored.user_id);
    assert_eq!(created.change_request_id, Some(request.id));
    assert_eq!(created.message_key, "notification.clinic_wants_to_change_appointment");

    fx.service.approve_change_request(request.id, TOKEN).await.unwrap();

    let approved = events.recv().await.unwrap();
    assert_eq!(approved.kind, NotificationKind::ChangeApproved);
    assert_eq!(approved.recipient.party, Party::Clinic);
    assert_eq!(approved.recipient.id, stored.clinic_id);
    assert_eq!(approved.message_key, "notification.change_request_approved");
}

#[tokio::test]
async fn test_approval_into_slot_taken_since_request_is_refused() {
    let fx = fixture().await;
    let second = fx.booked(None, "11:00", AppointmentStatus::Confirmed).await;
    let request = fx.propose(&second, Party::User, time_change("10:00")).await.unwrap();

    fx.booked(None, "10:00", AppointmentStatus::Confirmed).await;

    assert_matches!(
        fx.service.approve_change_request(request.id, TOKEN).await,
        Err(AppointmentError::SlotNotAvailable)
    );
    let stored = fx.store.get_appointment(second.id, TOKEN).await.unwrap().unwrap();
    assert_eq!(stored.time, "11:00");
    assert!(fx.service.get_change_request(request.id, TOKEN).await.unwrap().is_pending());
}

/// Holds the first two reads of a change request until both have arrived, so
/// two resolutions both observe it as pending.
struct LockstepReads {
    inner: InMemoryAppointmentStore,
    barrier: Barrier,
}

#[async_trait]
impl ChangeRequestRepository for LockstepReads {
    async fn get_change_request(&self, request_id: Uuid, auth_token: &str) -> Result<Option<ChangeRequest>, AppointmentError> {
        let request = self.inner.get_change_request(request_id, auth_token).await;
        self.barrier.wait().await;
        request
    }

    async fn list_change_requests(
        &self,
        appointment_id: Uuid,
        status: Option<ChangeRequestStatus>,
        auth_token: &str,
    ) -> Result<Vec<ChangeRequest>, AppointmentError> {
        self.inner.list_change_requests(appointment_id, status, auth_token).await
    }

    async fn insert_change_request(&self, request: ChangeRequest, auth_token: &str) -> Result<ChangeRequest, AppointmentError> {
        self.inner.insert_change_request(request, auth_token).await
    }

    async fn update_change_request_status(
        &self,
        request_id: Uuid,
        status: ChangeRequestStatus,
        auth_token: &str,
    ) -> Result<ChangeRequest, AppointmentError> {
        self.inner.update_change_request_status(request_id, status, auth_token).await
    }
}

#[tokio::test]
async fn test_concurrent_approve_and_reject_resolve_once() {
    let fx = fixture().await;
    let original = fx.booked(None, "10:00", AppointmentStatus::Confirmed).await;
    let request = fx.propose(&original, Party::Clinic, time_change("14:00")).await.unwrap();

    let lockstep = Arc::new(LockstepReads {
        inner: (*fx.store).clone(),
        barrier: Barrier::new(2),
    });
    let service = ChangeRequestService::new(
        fx.store.clone(),
        lockstep,
        fx.clinics.clone(),
        fx.notifier.clone(),
        AvailabilityCalculator::default(),
    );

    let (approved, rejected) = tokio::join!(
        service.approve_change_request(request.id, TOKEN),
        service.reject_change_request(request.id, TOKEN),
    );
    assert_ne!(approved.is_ok(), rejected.is_ok());

    let resolved = fx.service.get_change_request(request.id, TOKEN).await.unwrap();
    let stored = fx.store.get_appointment(original.id, TOKEN).await.unwrap().unwrap();
    match resolved.status {
        ChangeRequestStatus::Approved => assert_eq!(stored.time, "14:00"),
        ChangeRequestStatus::Rejected => {
            assert_matches!(approved, Err(AppointmentError::InvalidState(_)));
            assert_eq!(stored.time, "10:00");
        }
        ChangeRequestStatus::Pending => panic!("request left pending"),
    }
}

/// Accepts appointment writes but fails every status update.
struct FailingStatusUpdates {
    inner: InMemoryAppointmentStore,
}

#[async_trait]
impl ChangeRequestRepository for FailingStatusUpdates {
    async fn get_change_request(&self, request_id: Uuid, auth_token: &str) -> Result<Option<ChangeRequest>, AppointmentError> {
        self.inner.get_change_request(request_id, auth_token).await
    }

    async fn list_change_requests(
        &self,
        appointment_id: Uuid,
        status: Option<ChangeRequestStatus>,
        auth_token: &str,
    ) -> Result<Vec<ChangeRequest>, AppointmentError> {
        self.inner.list_change_requests(appointment_id, status, auth_token).await
    }

    async fn insert_change_request(&self, request: ChangeRequest, auth_token: &str) -> Result<ChangeRequest, AppointmentError> {
        self.inner.insert_change_request(request, auth_token).await
    }

    async fn update_change_request_status(
        &self,
        _request_id: Uuid,
        _status: ChangeRequestStatus,
        _auth_token: &str,
    ) -> Result<ChangeRequest, AppointmentError> {
        Err(AppointmentError::DatabaseError("connection reset".to_string()))
    }
}

#[tokio::test]
async fn test_failed_approval_restores_appointment() {
    let fx = fixture().await;
    let change_requests = Arc::new(FailingStatusUpdates { inner: (*fx.store).clone() });
    let service = ChangeRequestService::new(
        fx.store.clone(),
        change_requests,
        fx.clinics.clone(),
        Arc::new(BroadcastNotifier::default()),
        AvailabilityCalculator::default(),
    );

    let original = fx.booked(None, "10:00", AppointmentStatus::Pending).await;
    let request = service
        .create_change_request(original.id, Party::Clinic, "clinic-operator", time_change("14:00"), None, today(), TOKEN)
        .await
        .unwrap();

    let result = service.approve_change_request(request.id, TOKEN).await;
    assert_matches!(result, Err(AppointmentError::DatabaseError(_)));

    let stored = fx.store.get_appointment(original.id, TOKEN).await.unwrap().unwrap();
    assert_eq!(stored.time, original.time);
    assert_eq!(stored.date, original.date);
    assert_eq!(stored.status, original.status);
}
