use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EntityId, Role, StationRef};

/// Signin/signup response exactly as the backend emits it.
///
/// Only `token`, `username` and `role` are guaranteed; everything else is
/// optional and frequently missing depending on which endpoint and backend
/// version produced the payload. This shape never leaves the auth layer:
/// `SessionStore::set_auth` normalizes it into a `CurrentUser`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAuthPayload {
    pub token: String,
    pub username: String,
    pub role: String,
    #[serde(rename = "assignedStationIds", default)]
    pub assigned_station_ids: Option<Vec<EntityId>>,
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(rename = "firstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub station: Option<StationRef>,
}

#[derive(Clone, Serialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

impl SigninRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for SigninRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigninRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct SignupRequest {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_payload_parses() {
        let json = r#"{"token":"abc","username":"jdoe","role":"CASHIER"}"#;
        let raw: RawAuthPayload = serde_json::from_str(json).unwrap();
        assert_eq!(raw.username, "jdoe");
        assert!(raw.assigned_station_ids.is_none());
        assert!(raw.email.is_none());
        assert!(raw.station.is_none());
    }

    #[test]
    fn test_full_payload_parses() {
        let json = r#"{
            "token": "abc", "username": "jdoe", "role": "STORE_MANAGER",
            "assignedStationIds": [1, 2], "id": 17, "firstName": "Jane",
            "lastName": "Doe", "email": null, "status": "ACTIVE",
            "station": {"id": 3, "name": "Front Till"}
        }"#;
        let raw: RawAuthPayload = serde_json::from_str(json).unwrap();
        assert_eq!(raw.id, Some(EntityId::from(17)));
        assert_eq!(raw.assigned_station_ids.map(|ids| ids.len()), Some(2));
        assert_eq!(raw.station.map(|s| s.id), Some(EntityId::from(3)));
        assert!(raw.email.is_none());
    }

    #[test]
    fn test_signin_debug_hides_password() {
        let req = SigninRequest::new("jdoe", "hunter2");
        let debug = format!("{:?}", req);
        assert!(debug.contains("jdoe"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_reset_password_wire_names() {
        let req = ResetPasswordRequest {
            token: "t".to_string(),
            new_password: "p".to_string(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, serde_json::json!({"token": "t", "newPassword": "p"}));
    }
}
