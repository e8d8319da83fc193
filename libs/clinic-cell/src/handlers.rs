// libs/clinic-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ClinicError, CreateStaffRequest, ReplaceWorkingHoursRequest};
use crate::router::ClinicState;
use crate::services::{migrate_staff_roles, ClinicService};

impl From<ClinicError> for AppError {
    fn from(err: ClinicError) -> Self {
        match err {
            ClinicError::NotFound | ClinicError::StaffNotFound => AppError::NotFound(err.to_string()),
            ClinicError::ValidationError(msg) => AppError::ValidationError(msg),
            ClinicError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

fn ensure_can_manage(user: &User, clinic_id: Uuid) -> Result<(), AppError> {
    if user.can_manage_clinic(&clinic_id.to_string()) {
        Ok(())
    } else {
        Err(AppError::Auth("Not authorized to manage this clinic".to_string()))
    }
}

#[axum::debug_handler]
pub async fn get_clinic(
    State(state): State<Arc<ClinicState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(state.repository.clone());
    let clinic = service.get_clinic(clinic_id, auth.token()).await?;
    Ok(Json(json!(clinic)))
}

#[axum::debug_handler]
pub async fn get_working_hours(
    State(state): State<Arc<ClinicState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(state.repository.clone());
    let hours = service.get_working_hours(clinic_id, auth.token()).await?;
    Ok(Json(json!({ "working_hours": hours })))
}

#[axum::debug_handler]
pub async fn replace_working_hours(
    State(state): State<Arc<ClinicState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(clinic_id): Path<Uuid>,
    Json(request): Json<ReplaceWorkingHoursRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, clinic_id)?;

    let service = ClinicService::new(state.repository.clone());
    let hours = service
        .replace_working_hours(clinic_id, request.working_hours, auth.token())
        .await?;
    Ok(Json(json!({ "working_hours": hours })))
}

#[axum::debug_handler]
pub async fn list_staff(
    State(state): State<Arc<ClinicState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(state.repository.clone());
    let staff = service.list_staff(clinic_id, auth.token()).await?;
    Ok(Json(json!({
        "staff": staff,
        "total": staff.len()
    })))
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<ClinicState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(state.repository.clone());
    let doctors = service.list_doctors(clinic_id, auth.token()).await?;
    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn add_staff(
    State(state): State<Arc<ClinicState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(clinic_id): Path<Uuid>,
    Json(request): Json<CreateStaffRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, clinic_id)?;

    let service = ClinicService::new(state.repository.clone());
    let staff = service.add_staff(clinic_id, request, auth.token()).await?;
    Ok(Json(json!(staff)))
}

/// Admin-only backfill of staff roles for rows created before roles existed.
#[axum::debug_handler]
pub async fn migrate_roles(
    State(state): State<Arc<ClinicState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Role migration requires an admin account".to_string()));
    }

    let report = migrate_staff_roles(state.repository.clone(), clinic_id, auth.token()).await?;
    Ok(Json(json!(report)))
}
