use assert_matches::assert_matches;
use chrono::Weekday;
use serde_json::json;
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};

use clinic_cell::*;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

#[tokio::test]
async fn test_get_clinic_reads_jsonb_schedule() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_response(&clinic_id.to_string(), "Smile Dental")
        ])))
        .mount(&server)
        .await;

    let repo = SupabaseClinicRepository::new(&TestConfig::with_supabase_url(&server.uri()).to_app_config());
    let clinic = repo.get_clinic(clinic_id, "token").await.unwrap().expect("clinic exists");

    assert_eq!(clinic.name, "Smile Dental");
    assert_eq!(clinic.working_hours.len(), 7);
    assert!(clinic.hours_for(Weekday::Sat).unwrap().closed);
    assert_eq!(clinic.hours_for(Weekday::Mon).unwrap().window_minutes(), Some((540, 1080)));
}

#[tokio::test]
async fn test_missing_clinic_schedule_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let repo = SupabaseClinicRepository::new(&TestConfig::with_supabase_url(&server.uri()).to_app_config());
    let result = repo.get_working_hours(Uuid::new_v4(), "token").await;

    assert_matches!(result, Err(ClinicError::NotFound));
}

#[tokio::test]
async fn test_list_staff_accepts_rows_without_role() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let legacy_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_staff"))
        .and(query_param("clinic_id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::staff_response(&doctor_id, &clinic_id, "Dr. Ana Reyes", Some("doctor")),
            MockSupabaseResponses::staff_response(&legacy_id, &clinic_id, "Dr. Legacy", None),
        ])))
        .mount(&server)
        .await;

    let repo = SupabaseClinicRepository::new(&TestConfig::with_supabase_url(&server.uri()).to_app_config());
    let staff = repo.list_staff(clinic_id.parse().unwrap(), "token").await.unwrap();

    assert_eq!(staff.len(), 2);
    assert_eq!(staff[0].role, Some(StaffRole::Doctor));
    assert_eq!(staff[1].role, None);
}

#[tokio::test]
async fn test_update_staff_role_sends_snake_case_role() {
    let server = MockServer::start().await;
    let staff_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/clinic_staff"))
        .and(body_partial_json(json!({ "role": "hygienist" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let repo = SupabaseClinicRepository::new(&TestConfig::with_supabase_url(&server.uri()).to_app_config());
    let result = repo.update_staff_role(staff_id, StaffRole::Hygienist, "token").await;

    assert_matches!(result, Err(ClinicError::StaffNotFound));
}
