use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Clinic the account operates for, present on clinic staff accounts.
    pub fn clinic_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("clinic_id"))
            .and_then(|v| v.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }

    pub fn is_clinic_staff(&self) -> bool {
        self.role.as_deref() == Some("clinic") && self.clinic_id().is_some()
    }

    /// Whether this account may act on behalf of the given clinic.
    pub fn can_manage_clinic(&self, clinic_id: &str) -> bool {
        self.is_admin() || self.clinic_id() == Some(clinic_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(role: &str, metadata: Option<serde_json::Value>) -> User {
        User {
            id: "u-1".to_string(),
            email: None,
            role: Some(role.to_string()),
            metadata,
            created_at: None,
        }
    }

    #[test]
    fn clinic_staff_requires_clinic_metadata() {
        assert!(user("clinic", Some(json!({ "clinic_id": "c-1" }))).is_clinic_staff());
        assert!(!user("clinic", None).is_clinic_staff());
        assert!(!user("patient", Some(json!({ "clinic_id": "c-1" }))).is_clinic_staff());
    }

    #[test]
    fn admin_manages_every_clinic() {
        assert!(user("admin", None).can_manage_clinic("c-9"));
        assert!(!user("patient", None).can_manage_clinic("c-9"));
        assert!(user("clinic", Some(json!({ "clinic_id": "c-9" }))).can_manage_clinic("c-9"));
    }
}
