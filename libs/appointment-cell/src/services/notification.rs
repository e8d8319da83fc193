// libs/appointment-cell/src/services/notification.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, ChangeRequest, Party};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AppointmentBooked,
    StatusChanged,
    ChangeRequested,
    ChangeApproved,
    ChangeRejected,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AppointmentBooked => "appointment_booked",
            NotificationKind::StatusChanged => "status_changed",
            NotificationKind::ChangeRequested => "change_requested",
            NotificationKind::ChangeApproved => "change_approved",
            NotificationKind::ChangeRejected => "change_rejected",
        }
    }
}

/// Who an event is addressed to: a clinic (any of its operators) or one patient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    pub party: Party,
    pub id: Uuid,
}

impl Recipient {
    pub fn side_of(appointment: &Appointment, party: Party) -> Self {
        let id = match party {
            Party::Clinic => appointment.clinic_id,
            Party::User => appointment.user_id,
        };
        Self { party, id }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub recipient: Recipient,
    pub appointment_id: Uuid,
    pub change_request_id: Option<Uuid>,
    pub message_key: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    fn new(kind: NotificationKind, recipient: Recipient, appointment_id: Uuid, message_key: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            recipient,
            appointment_id,
            change_request_id: None,
            message_key,
            created_at: Utc::now(),
        }
    }

    pub fn appointment_booked(appointment: &Appointment) -> Self {
        Self::new(
            NotificationKind::AppointmentBooked,
            Recipient::side_of(appointment, Party::Clinic),
            appointment.id,
            "notification.new_appointment_booked".to_string(),
        )
    }

    pub fn status_changed(appointment: &Appointment, changed_by: Party, status: AppointmentStatus) -> Self {
        Self::new(
            NotificationKind::StatusChanged,
            Recipient::side_of(appointment, changed_by.opposite()),
            appointment.id,
            format!("notification.appointment_{}", status),
        )
    }

    pub fn change_requested(appointment: &Appointment, request: &ChangeRequest) -> Self {
        let message_key = match request.requested_by {
            Party::Clinic => "notification.clinic_wants_to_change_appointment",
            Party::User => "notification.patient_wants_to_change_appointment",
        };
        Self {
            change_request_id: Some(request.id),
            ..Self::new(
                NotificationKind::ChangeRequested,
                Recipient::side_of(appointment, request.requested_by.opposite()),
                appointment.id,
                message_key.to_string(),
            )
        }
    }

    /// Sent back to whoever asked for the change.
    pub fn change_resolved(appointment: &Appointment, request: &ChangeRequest, approved: bool) -> Self {
        let (kind, message_key) = if approved {
            (NotificationKind::ChangeApproved, "notification.change_request_approved")
        } else {
            (NotificationKind::ChangeRejected, "notification.change_request_rejected")
        };
        Self {
            change_request_id: Some(request.id),
            ..Self::new(
                kind,
                Recipient::side_of(appointment, request.requested_by),
                appointment.id,
                message_key.to_string(),
            )
        }
    }
}

/// Fire-and-forget publish/subscribe. Publishing never fails the caller;
/// events reach only listeners subscribed at the time of the call.
pub trait Notifier: Send + Sync {
    fn publish(&self, event: NotificationEvent);

    fn subscribe(&self) -> broadcast::Receiver<NotificationEvent>;
}

#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<NotificationEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(shared_config::DEFAULT_NOTIFICATION_BUFFER)
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, event: NotificationEvent) {
        let kind = event.kind;
        match self.sender.send(event) {
            Ok(listeners) => debug!("Published {} to {} listener(s)", kind.as_str(), listeners),
            Err(_) => debug!("Published {} with no listeners", kind.as_str()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.sender.subscribe()
    }
}
