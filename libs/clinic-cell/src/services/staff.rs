// libs/clinic-cell/src/services/staff.rs
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{ClinicError, StaffRole};
use crate::repository::ClinicRepository;

const DOCTOR_MARKERS: &[&str] = &[
    "dr.", "dr ", "doctor", "dentist", "dds", "dmd", "orthodont", "endodont",
    "periodont", "prosthodont", "oral surgeon", "maxillofacial", "implantolog",
];
const HYGIENIST_MARKERS: &[&str] = &["hygienist", "hygiene"];
const ASSISTANT_MARKERS: &[&str] = &["assistant", "nurse"];
const RECEPTION_MARKERS: &[&str] = &["reception", "front desk", "secretary"];
const MANAGER_MARKERS: &[&str] = &["manager", "director", "owner", "admin"];

/// Legacy substring heuristic that guessed a role from free-text title and
/// specialty. Only `migrate_staff_roles` calls this.
pub fn infer_role_from_title(title: &str, specialty: Option<&str>) -> StaffRole {
    let text = format!("{} {}", title, specialty.unwrap_or_default()).to_lowercase();
    let text = format!("{} ", text.trim());
    let has = |markers: &[&str]| markers.iter().any(|m| text.contains(m));

    // Narrow roles first: "Assistant to Dr. Reyes" is an assistant.
    if has(HYGIENIST_MARKERS) {
        StaffRole::Hygienist
    } else if has(ASSISTANT_MARKERS) {
        StaffRole::Assistant
    } else if has(DOCTOR_MARKERS) {
        StaffRole::Doctor
    } else if has(RECEPTION_MARKERS) {
        StaffRole::Receptionist
    } else if has(MANAGER_MARKERS) {
        StaffRole::Manager
    } else {
        StaffRole::Other
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RoleMigrationReport {
    pub examined: usize,
    pub assigned: Vec<(Uuid, StaffRole)>,
    pub failed: Vec<Uuid>,
}

/// One-time backfill of `role` for staff rows created before roles existed.
/// Rows that already carry a role are left alone.
pub async fn migrate_staff_roles(
    repository: Arc<dyn ClinicRepository>,
    clinic_id: Uuid,
    auth_token: &str,
) -> Result<RoleMigrationReport, ClinicError> {
    let staff = repository.list_staff(clinic_id, auth_token).await?;
    let mut report = RoleMigrationReport {
        examined: staff.len(),
        ..RoleMigrationReport::default()
    };

    for member in staff.into_iter().filter(|m| m.role.is_none()) {
        let role = infer_role_from_title(&member.title, member.specialty.as_deref());
        match repository.update_staff_role(member.id, role, auth_token).await {
            Ok(()) => report.assigned.push((member.id, role)),
            Err(e) => {
                warn!("Could not assign role to staff {}: {}", member.id, e);
                report.failed.push(member.id);
            }
        }
    }

    info!(
        "Role migration for clinic {}: {} examined, {} assigned, {} failed",
        clinic_id,
        report.examined,
        report.assigned.len(),
        report.failed.len()
    );
    Ok(report)
}
