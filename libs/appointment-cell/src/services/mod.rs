pub mod availability;
pub mod booking;
pub mod change_request;
pub mod lifecycle;
pub mod notification;
pub mod status;

pub use availability::{AvailabilityCalculator, AvailabilityService};
pub use booking::BookingService;
pub use change_request::ChangeRequestService;
pub use lifecycle::AppointmentLifecycleService;
pub use notification::{BroadcastNotifier, NotificationEvent, NotificationKind, Notifier, Recipient};
pub use status::StatusService;
