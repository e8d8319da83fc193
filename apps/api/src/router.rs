use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tracing::info;

use appointment_cell::{
    appointment_routes, AppointmentRepository, AppointmentState, AvailabilityCalculator,
    BroadcastNotifier, ChangeRequestRepository, InMemoryAppointmentStore,
    SupabaseAppointmentRepository,
};
use clinic_cell::{
    clinic_routes, ClinicRepository, ClinicState, InMemoryClinicStore, SupabaseClinicRepository,
};
use shared_config::{AppConfig, StorageBackend};

struct Repositories {
    clinics: Arc<dyn ClinicRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    change_requests: Arc<dyn ChangeRequestRepository>,
}

fn build_repositories(config: &AppConfig) -> Repositories {
    info!("Using {:?} storage backend", config.storage_backend);

    match config.storage_backend {
        StorageBackend::Supabase => {
            let store = Arc::new(SupabaseAppointmentRepository::new(config));
            Repositories {
                clinics: Arc::new(SupabaseClinicRepository::new(config)),
                appointments: store.clone(),
                change_requests: store,
            }
        }
        StorageBackend::Memory => {
            let store = Arc::new(InMemoryAppointmentStore::new());
            Repositories {
                clinics: Arc::new(InMemoryClinicStore::new()),
                appointments: store.clone(),
                change_requests: store,
            }
        }
    }
}

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let repositories = build_repositories(&config);

    let clinic_state = Arc::new(ClinicState {
        config: config.clone(),
        repository: repositories.clinics.clone(),
    });

    let appointment_state = Arc::new(AppointmentState {
        config: config.clone(),
        appointments: repositories.appointments,
        change_requests: repositories.change_requests,
        clinics: repositories.clinics,
        notifier: Arc::new(BroadcastNotifier::new(config.notification_buffer)),
        calculator: AvailabilityCalculator::new(config.slot_interval_minutes),
    });

    Router::new()
        .route("/", get(|| async { "Dental booking API is running!" }))
        .nest("/clinics", clinic_routes(clinic_state))
        .nest("/appointments", appointment_routes(appointment_state))
}
