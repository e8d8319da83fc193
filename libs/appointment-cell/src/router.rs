// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use clinic_cell::ClinicRepository;
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::repository::{AppointmentRepository, ChangeRequestRepository};
use crate::services::{AvailabilityCalculator, Notifier};

pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub change_requests: Arc<dyn ChangeRequestRepository>,
    pub clinics: Arc<dyn ClinicRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub calculator: AvailabilityCalculator,
}

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    // All appointment operations require authentication
    Router::new()
        // Availability
        .route("/availability/{clinic_id}/dates", get(handlers::get_available_dates))
        .route("/availability/{clinic_id}/slots", get(handlers::get_available_slots))

        // Appointments
        .route("/", post(handlers::book_appointment))
        .route("/search", get(handlers::search_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", put(handlers::update_appointment_status))

        // Change requests
        .route(
            "/{appointment_id}/change-requests",
            get(handlers::list_change_requests).post(handlers::create_change_request),
        )
        .route("/{appointment_id}/change-requests/pending", get(handlers::get_pending_change_request))
        .route("/change-requests/{request_id}/approve", post(handlers::approve_change_request))
        .route("/change-requests/{request_id}/reject", post(handlers::reject_change_request))

        // Live updates
        .route("/notifications/stream", get(handlers::notification_stream))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
