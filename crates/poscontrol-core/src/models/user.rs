use serde::{Deserialize, Serialize};

use super::{EntityId, Role};

/// A user as listed by the administration endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserRecord {
    #[cfg_attr(feature = "ts", ts(type = "string | number"))]
    pub id: EntityId,
    pub username: String,
    #[serde(rename = "firstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(rename = "assignedStationIds", default)]
    #[cfg_attr(feature = "ts", ts(type = "Array<string | number>"))]
    pub assigned_station_ids: Vec<EntityId>,
}

impl UserRecord {
    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        let name = format!("{} {}", first, last).trim().to_string();
        if name.is_empty() {
            self.username.clone()
        } else {
            name
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateUserRequest {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(rename = "stationIds")]
    pub station_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateUserRequest {
    #[serde(rename = "firstName", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "stationIds", skip_serializing_if = "Option::is_none")]
    pub station_ids: Option<Vec<EntityId>>,
}

/// Self-service profile edit for the logged-in user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(rename = "firstName", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LoginHistoryEntry {
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "string | number | null"))]
    pub id: Option<EntityId>,
    #[serde(rename = "userId", default)]
    #[cfg_attr(feature = "ts", ts(type = "string | number | null"))]
    pub user_id: Option<EntityId>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "loginTime", default)]
    pub login_time: Option<String>,
    #[serde(rename = "ipAddress", default)]
    pub ip_address: Option<String>,
    #[serde(rename = "userAgent", default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
}
