use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Utc, Weekday};
use uuid::Uuid;

use clinic_cell::*;

const TOKEN: &str = "test-token";

fn clinic(id: Uuid) -> Clinic {
    Clinic {
        id,
        name: "Smile Dental".to_string(),
        address: "1 Harbour Street".to_string(),
        phone: Some("+353 1 555 0100".to_string()),
        email: None,
        working_hours: vec![WorkingHours::open(Weekday::Mon, "09:00", "18:00")],
        is_active: true,
        created_at: Utc::now(),
        updated_at: None,
    }
}

fn staff(clinic_id: Uuid, name: &str, title: &str, role: Option<StaffRole>) -> StaffMember {
    StaffMember {
        id: Uuid::new_v4(),
        clinic_id,
        name: name.to_string(),
        title: title.to_string(),
        specialty: None,
        specialties: vec![],
        phone: None,
        email: None,
        services: vec![],
        role,
        is_active: true,
    }
}

async fn seeded_store() -> (Arc<InMemoryClinicStore>, Uuid) {
    let store = Arc::new(InMemoryClinicStore::new());
    let clinic_id = Uuid::new_v4();
    store.put_clinic(clinic(clinic_id)).await;
    (store, clinic_id)
}

#[tokio::test]
async fn test_get_missing_clinic_is_not_found() {
    let (store, _) = seeded_store().await;
    let service = ClinicService::new(store);

    let result = service.get_clinic(Uuid::new_v4(), TOKEN).await;
    assert_matches!(result, Err(ClinicError::NotFound));
}

#[tokio::test]
async fn test_replace_working_hours_orders_week_from_monday() {
    let (store, clinic_id) = seeded_store().await;
    let service = ClinicService::new(store);

    let hours = vec![
        WorkingHours::closed(Weekday::Sun),
        WorkingHours::open(Weekday::Wed, "10:00", "16:00"),
        WorkingHours::open(Weekday::Mon, "09:00", "18:00"),
    ];

    let stored = service.replace_working_hours(clinic_id, hours, TOKEN).await.unwrap();
    let days: Vec<&str> = stored.iter().map(|h| h.day.as_str()).collect();
    assert_eq!(days, vec!["Monday", "Wednesday", "Sunday"]);
}

#[tokio::test]
async fn test_replace_working_hours_rejects_inverted_window() {
    let (store, clinic_id) = seeded_store().await;
    let service = ClinicService::new(store.clone());

    let result = service
        .replace_working_hours(clinic_id, vec![WorkingHours::open(Weekday::Tue, "17:00", "08:00")], TOKEN)
        .await;
    assert_matches!(result, Err(ClinicError::ValidationError(_)));

    // Nothing was written.
    let hours = service.get_working_hours(clinic_id, TOKEN).await.unwrap();
    assert_eq!(hours, vec![WorkingHours::open(Weekday::Mon, "09:00", "18:00")]);
}

#[tokio::test]
async fn test_replace_working_hours_rejects_duplicate_days() {
    let (store, clinic_id) = seeded_store().await;
    let service = ClinicService::new(store);

    let result = service
        .replace_working_hours(
            clinic_id,
            vec![
                WorkingHours::open(Weekday::Mon, "09:00", "12:00"),
                WorkingHours::open(Weekday::Mon, "13:00", "18:00"),
            ],
            TOKEN,
        )
        .await;
    assert_matches!(result, Err(ClinicError::ValidationError(msg)) if msg.contains("Duplicate"));
}

#[tokio::test]
async fn test_list_doctors_uses_explicit_role_only() {
    let (store, clinic_id) = seeded_store().await;
    store.put_staff(staff(clinic_id, "Dr. Ana Reyes", "Dentist", Some(StaffRole::Doctor))).await;
    store.put_staff(staff(clinic_id, "Dr. Legacy", "Dentist", None)).await;
    store.put_staff(staff(clinic_id, "Tom", "Hygienist", Some(StaffRole::Hygienist))).await;
    let mut inactive = staff(clinic_id, "Dr. Gone", "Dentist", Some(StaffRole::Doctor));
    inactive.is_active = false;
    store.put_staff(inactive).await;

    let service = ClinicService::new(store);
    let doctors = service.list_doctors(clinic_id, TOKEN).await.unwrap();

    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].name, "Dr. Ana Reyes");
}

#[tokio::test]
async fn test_add_staff_requires_name_and_known_clinic() {
    let (store, clinic_id) = seeded_store().await;
    let service = ClinicService::new(store);

    let request = CreateStaffRequest {
        name: "  ".to_string(),
        title: "Dentist".to_string(),
        role: StaffRole::Doctor,
        specialty: None,
        specialties: vec![],
        phone: None,
        email: None,
        services: vec![],
    };
    assert_matches!(
        service.add_staff(clinic_id, request.clone(), TOKEN).await,
        Err(ClinicError::ValidationError(_))
    );

    let named = CreateStaffRequest { name: "Dr. Ana Reyes".to_string(), ..request };
    assert_matches!(
        service.add_staff(Uuid::new_v4(), named.clone(), TOKEN).await,
        Err(ClinicError::NotFound)
    );

    let created = service.add_staff(clinic_id, named, TOKEN).await.unwrap();
    assert_eq!(created.role, Some(StaffRole::Doctor));
    assert!(created.is_bookable_doctor());
}

#[test]
fn test_role_heuristic_matches_common_titles() {
    assert_eq!(infer_role_from_title("Dr. Ana Reyes", None), StaffRole::Doctor);
    assert_eq!(infer_role_from_title("Dentist", None), StaffRole::Doctor);
    assert_eq!(infer_role_from_title("Specialist", Some("Orthodontics")), StaffRole::Doctor);
    assert_eq!(infer_role_from_title("Dental Hygienist", None), StaffRole::Hygienist);
    assert_eq!(infer_role_from_title("Assistant to Dr. Reyes", None), StaffRole::Assistant);
    assert_eq!(infer_role_from_title("Receptionist", None), StaffRole::Receptionist);
    assert_eq!(infer_role_from_title("Practice Manager", None), StaffRole::Manager);
    assert_eq!(infer_role_from_title("Driver", None), StaffRole::Other);
}

#[tokio::test]
async fn test_migration_backfills_missing_roles_only() {
    let (store, clinic_id) = seeded_store().await;
    let legacy_doctor = staff(clinic_id, "Dr. Legacy", "Dentist", None);
    let legacy_desk = staff(clinic_id, "Mia", "Front desk", None);
    let mut already_set = staff(clinic_id, "Zoe", "Dentist", Some(StaffRole::Manager));
    already_set.specialty = Some("Owner".to_string());

    store.put_staff(legacy_doctor.clone()).await;
    store.put_staff(legacy_desk.clone()).await;
    store.put_staff(already_set.clone()).await;

    let repository: Arc<dyn ClinicRepository> = store.clone();
    let report = migrate_staff_roles(repository, clinic_id, TOKEN).await.unwrap();

    assert_eq!(report.examined, 3);
    assert_eq!(report.assigned.len(), 2);
    assert!(report.failed.is_empty());

    let service = ClinicService::new(store);
    assert_eq!(service.get_staff(legacy_doctor.id, TOKEN).await.unwrap().role, Some(StaffRole::Doctor));
    assert_eq!(service.get_staff(legacy_desk.id, TOKEN).await.unwrap().role, Some(StaffRole::Receptionist));
    assert_eq!(service.get_staff(already_set.id, TOKEN).await.unwrap().role, Some(StaffRole::Manager));
}
