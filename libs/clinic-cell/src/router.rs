// libs/clinic-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::repository::ClinicRepository;

pub struct ClinicState {
    pub config: Arc<AppConfig>,
    pub repository: Arc<dyn ClinicRepository>,
}

pub fn clinic_routes(state: Arc<ClinicState>) -> Router {
    Router::new()
        .route("/{clinic_id}", get(handlers::get_clinic))
        .route(
            "/{clinic_id}/working-hours",
            get(handlers::get_working_hours).put(handlers::replace_working_hours),
        )
        .route(
            "/{clinic_id}/staff",
            get(handlers::list_staff).post(handlers::add_staff),
        )
        .route("/{clinic_id}/staff/migrate-roles", post(handlers::migrate_roles))
        .route("/{clinic_id}/doctors", get(handlers::list_doctors))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
