pub mod clinic;
pub mod staff;

pub use clinic::ClinicService;
pub use staff::{infer_role_from_title, migrate_staff_roles, RoleMigrationReport};
