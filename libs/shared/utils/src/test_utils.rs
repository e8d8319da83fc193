use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub storage_backend: StorageBackend,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            storage_backend: StorageBackend::Memory,
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            storage_backend: StorageBackend::Supabase,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage_backend: self.storage_backend,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub clinic_id: Option<String>,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
            clinic_id: None,
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            clinic_id: None,
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn clinic_staff(email: &str, clinic_id: &str) -> Self {
        Self {
            clinic_id: Some(clinic_id.to_string()),
            ..Self::new(email, "clinic")
        }
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: self.clinic_id.as_ref().map(|c| json!({ "clinic_id": c })),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "app_metadata": user.clinic_id.as_ref().map(|c| json!({ "clinic_id": c })),
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// PostgREST row shapes for the booking tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn weekday_schedule(open: &str, close: &str) -> serde_json::Value {
        let weekdays = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];
        let mut days: Vec<serde_json::Value> = weekdays
            .iter()
            .map(|day| json!({ "day": day, "open_time": open, "close_time": close, "closed": false }))
            .collect();
        for day in ["Saturday", "Sunday"] {
            days.push(json!({ "day": day, "open_time": open, "close_time": close, "closed": true }));
        }
        json!(days)
    }

    pub fn clinic_response(clinic_id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": clinic_id,
            "name": name,
            "address": "1 Harbour Street",
            "phone": "+353 1 555 0100",
            "email": "front-desk@smile.test",
            "working_hours": Self::weekday_schedule("09:00", "18:00"),
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": null
        })
    }

    pub fn staff_response(staff_id: &str, clinic_id: &str, name: &str, role: Option<&str>) -> serde_json::Value {
        json!({
            "id": staff_id,
            "clinic_id": clinic_id,
            "name": name,
            "title": "Dentist",
            "specialty": "General Dentistry",
            "specialties": [],
            "phone": null,
            "email": null,
            "services": ["Check-up", "Filling"],
            "role": role,
            "is_active": true
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        user_id: &str,
        clinic_id: &str,
        doctor_id: Option<&str>,
        date: &str,
        time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "user_id": user_id,
            "clinic_id": clinic_id,
            "doctor_id": doctor_id,
            "clinic_name": "Smile Dental",
            "clinic_address": "1 Harbour Street",
            "clinic_phone": "+353 1 555 0100",
            "clinic_email": "front-desk@smile.test",
            "service": "Check-up",
            "date": date,
            "time": time,
            "notes": null,
            "complaint": null,
            "urgent": false,
            "price": null,
            "payment_status": null,
            "status": status,
            "cancellation_reason": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": null
        })
    }

    pub fn change_request_response(
        request_id: &str,
        appointment_id: &str,
        requested_by: &str,
        new_time: Option<&str>,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": request_id,
            "appointment_id": appointment_id,
            "requested_by": requested_by,
            "requester_id": "requester",
            "new_date": null,
            "new_time": new_time,
            "new_doctor_id": null,
            "new_service": null,
            "reason": null,
            "status": status,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": null
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
