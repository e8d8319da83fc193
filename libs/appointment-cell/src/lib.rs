pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;

pub use models::*;
pub use repository::{
    AppointmentRepository, ChangeRequestRepository, InMemoryAppointmentStore,
    SupabaseAppointmentRepository,
};
pub use router::{appointment_routes, AppointmentState};
pub use services::*;
