// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, Utc};
use futures::stream::{self, Stream};
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    BookAppointmentRequest, CreateChangeRequestRequest, ErrorKind, Party, UpdateStatusRequest,
};
use crate::router::AppointmentState;
use crate::services::{
    AppointmentLifecycleService, AvailabilityService, BookingService, ChangeRequestService,
    Recipient, StatusService,
};

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::InvalidState => AppError::InvalidState(message),
            ErrorKind::Validation => AppError::ValidationError(message),
            ErrorKind::Conflict => AppError::Conflict(message),
            ErrorKind::Unauthorized => AppError::Auth(message),
            ErrorKind::Unexpected => AppError::Database(message),
        }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailableDatesQuery {
    pub from: Option<NaiveDate>,
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: NaiveDate,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub clinic_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct PendingChangeQuery {
    pub viewer: Option<Party>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationStreamQuery {
    pub clinic_id: Option<Uuid>,
}

// ==============================================================================
// AUTHORIZATION HELPERS
// ==============================================================================

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

/// Which side of `appointment` the caller acts for. Clinic operators (and
/// admins) act as the clinic; the booking patient acts as the user.
fn party_for(user: &User, appointment: &Appointment) -> Result<Party, AppError> {
    if user.can_manage_clinic(&appointment.clinic_id.to_string()) {
        Ok(Party::Clinic)
    } else if user.id == appointment.user_id.to_string() {
        Ok(Party::User)
    } else {
        Err(AppError::Auth("Not authorized to access this appointment".to_string()))
    }
}

fn status_service(state: &AppointmentState) -> StatusService {
    StatusService::new(state.appointments.clone(), state.notifier.clone())
}

fn change_request_service(state: &AppointmentState) -> ChangeRequestService {
    ChangeRequestService::new(
        state.appointments.clone(),
        state.change_requests.clone(),
        state.clinics.clone(),
        state.notifier.clone(),
        state.calculator,
    )
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_dates(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
    Query(params): Query<AvailableDatesQuery>,
) -> Result<Json<Value>, AppError> {
    let from = params.from.unwrap_or_else(|| Utc::now().date_naive());
    let days = params.days.unwrap_or(state.config.booking_horizon_days);
    if days > state.config.booking_horizon_days {
        return Err(AppError::ValidationError(format!(
            "days cannot exceed {}",
            state.config.booking_horizon_days
        )));
    }

    let service = AvailabilityService::new(state.clinics.clone(), state.appointments.clone(), state.calculator);
    let dates = service.available_dates(clinic_id, from, days, auth.token()).await?;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "from": from,
        "days": days,
        "dates": dates
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
    Query(params): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(state.clinics.clone(), state.appointments.clone(), state.calculator);
    let slots = service
        .available_slots(clinic_id, params.date, params.doctor_id, auth.token())
        .await?;

    Ok(Json(json!({
        "clinic_id": clinic_id,
        "date": params.date,
        "doctor_id": params.doctor_id,
        "interval_minutes": state.calculator.slot_interval_minutes(),
        "slots": slots
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = user_uuid(&user)?;

    let booking_service = BookingService::new(
        state.appointments.clone(),
        state.clinics.clone(),
        state.notifier.clone(),
        state.calculator,
    );
    let appointment = booking_service
        .book_appointment(user_id, request, Utc::now().date_naive(), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(params): Query<AppointmentQueryParams>,
) -> Result<Json<Value>, AppError> {
    let mut search_query = AppointmentSearchQuery {
        clinic_id: params.clinic_id,
        user_id: params.user_id,
        doctor_id: params.doctor_id,
        status: params.status,
        from_date: params.from_date,
        to_date: params.to_date,
        limit: params.limit,
        offset: params.offset,
    };

    // Non-admins only see their own clinic's or their own appointments
    if !user.is_admin() {
        match user.clinic_id().filter(|_| user.is_clinic_staff()) {
            Some(clinic_id) => {
                let clinic_uuid = Uuid::parse_str(clinic_id)
                    .map_err(|_| AppError::BadRequest("Invalid clinic ID".to_string()))?;
                search_query.clinic_id = Some(clinic_uuid);
            }
            None => search_query.user_id = Some(user_uuid(&user)?),
        }
    }

    let appointments = status_service(&state)
        .list_appointments(&search_query, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
        "limit": params.limit,
        "offset": params.offset
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = status_service(&state)
        .get_appointment(appointment_id, auth.token())
        .await?;
    party_for(&user, &appointment)?;

    let actions = AppointmentLifecycleService::new().available_actions(&appointment.status);

    Ok(Json(json!({
        "appointment": appointment,
        "available_actions": actions
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = status_service(&state);

    let appointment = service.get_appointment(appointment_id, token).await?;
    let actor = party_for(&user, &appointment)?;

    // Patients may only cancel; confirming and completing belong to the clinic
    if actor == Party::User && request.status != AppointmentStatus::Cancelled {
        return Err(AppError::Auth("Patients can only cancel appointments".to_string()));
    }

    let updated = service
        .update_appointment_status(appointment_id, request.status, request.reason, actor, token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": format!("Appointment {}", updated.status)
    })))
}

// ==============================================================================
// CHANGE REQUEST HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_change_request(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CreateChangeRequestRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let appointment = status_service(&state).get_appointment(appointment_id, token).await?;
    let requested_by = party_for(&user, &appointment)?;

    let change_request = change_request_service(&state)
        .create_change_request(
            appointment_id,
            requested_by,
            &user.id,
            request.deltas,
            request.reason,
            Utc::now().date_naive(),
            token,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "change_request": change_request
    })))
}

#[axum::debug_handler]
pub async fn list_change_requests(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let appointment = status_service(&state).get_appointment(appointment_id, token).await?;
    party_for(&user, &appointment)?;

    let requests = change_request_service(&state)
        .list_change_requests(appointment_id, token)
        .await?;

    Ok(Json(json!({
        "change_requests": requests,
        "total": requests.len()
    })))
}

/// The pending request the caller is expected to answer, or `null`.
#[axum::debug_handler]
pub async fn get_pending_change_request(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Query(params): Query<PendingChangeQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let appointment = status_service(&state).get_appointment(appointment_id, token).await?;
    let party = party_for(&user, &appointment)?;
    let viewer = params.viewer.unwrap_or(party);
    if viewer != party && !user.is_admin() {
        return Err(AppError::Auth("Cannot view change requests as the other party".to_string()));
    }

    let pending = change_request_service(&state)
        .pending_change_request_for_viewer(appointment_id, viewer, token)
        .await?;

    Ok(Json(json!({ "change_request": pending })))
}

/// Resolving is reserved for the party that did not raise the request.
async fn ensure_can_resolve(
    state: &AppointmentState,
    user: &User,
    request_id: Uuid,
    token: &str,
) -> Result<(), AppError> {
    let request = change_request_service(state).get_change_request(request_id, token).await?;
    let appointment = status_service(state).get_appointment(request.appointment_id, token).await?;
    let party = party_for(user, &appointment)?;

    if party != request.requested_by.opposite() {
        return Err(AppError::Auth(
            "Change requests must be resolved by the other party".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn approve_change_request(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    ensure_can_resolve(&state, &user, request_id, token).await?;

    let resolution = change_request_service(&state)
        .approve_change_request(request_id, token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "change_request": resolution.change_request,
        "appointment": resolution.appointment
    })))
}

#[axum::debug_handler]
pub async fn reject_change_request(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    ensure_can_resolve(&state, &user, request_id, token).await?;

    let change_request = change_request_service(&state)
        .reject_change_request(request_id, token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "change_request": change_request
    })))
}

// ==============================================================================
// NOTIFICATION STREAM
// ==============================================================================

/// Server-sent events addressed to the caller, or to `clinic_id` when the
/// caller operates that clinic. Events published before connecting are not
/// replayed.
pub async fn notification_stream(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Query(params): Query<NotificationStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let recipient = match params.clinic_id {
        Some(clinic_id) => {
            if !user.can_manage_clinic(&clinic_id.to_string()) {
                return Err(AppError::Auth("Not authorized for this clinic's notifications".to_string()));
            }
            Recipient { party: Party::Clinic, id: clinic_id }
        }
        None => Recipient { party: Party::User, id: user_uuid(&user)? },
    };

    debug!("Opening notification stream for {} {}", recipient.party, recipient.id);
    let receiver = state.notifier.subscribe();

    let events = stream::unfold(receiver, move |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) if event.recipient == recipient => {
                    let sse = Event::default().event(event.kind.as_str()).json_data(&event);
                    return Some((sse, receiver));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Notification stream lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
