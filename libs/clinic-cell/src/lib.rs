pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;

pub use models::*;
pub use repository::{ClinicRepository, InMemoryClinicStore, SupabaseClinicRepository};
pub use router::{clinic_routes, ClinicState};
pub use services::*;
