use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::storage::{MemoryStorage, StorageError, StoragePort};
use super::token;
use crate::models::{EntityId, ProfileUpdate, RawAuthPayload, Role};

/// Storage key for the bearer token
pub const TOKEN_KEY: &str = "poscontrol.token";

/// Storage key for the normalized user record
pub const USER_KEY: &str = "poscontrol.user";

/// Storage key for the "remember me" username
pub const REMEMBERED_USERNAME_KEY: &str = "poscontrol.remembered_username";

/// Fallback email domain when the server omits an email
const PLACEHOLDER_EMAIL_DOMAIN: &str = "example.com";

/// Status values that mean the account cannot be used
const DISABLED_STATUSES: [&str; 4] = ["INACTIVE", "DISABLED", "SUSPENDED", "LOCKED"];

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Auth payload has an empty token")]
    EmptyToken,

    #[error("Failed to encode user record: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The logged-in user in canonical form.
///
/// Every field is filled; defaults are substituted during normalization so
/// consumers never deal with the server's optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CurrentUser {
    #[cfg_attr(feature = "ts", ts(type = "string | number | null"))]
    pub user_id: Option<EntityId>,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: String,
    pub enabled: bool,
    #[cfg_attr(feature = "ts", ts(type = "Array<string | number>"))]
    pub assigned_station_ids: BTreeSet<EntityId>,
    pub login_time: DateTime<Utc>,
}

impl CurrentUser {
    /// Normalize a raw signin/signup payload.
    pub fn from_raw(raw: &RawAuthPayload, login_time: DateTime<Utc>) -> Self {
        let username = raw.username.trim().to_string();

        let first_name = non_blank(raw.first_name.as_deref()).unwrap_or_else(|| username.clone());
        let last_name = non_blank(raw.last_name.as_deref()).unwrap_or_default();
        let email = non_blank(raw.email.as_deref())
            .unwrap_or_else(|| format!("{}@{}", username, PLACEHOLDER_EMAIL_DOMAIN));

        let status = non_blank(raw.status.as_deref())
            .map(|s| s.to_ascii_uppercase())
            .unwrap_or_else(|| "ACTIVE".to_string());
        let enabled = raw
            .enabled
            .unwrap_or_else(|| !DISABLED_STATUSES.contains(&status.as_str()));

        let mut assigned_station_ids: BTreeSet<EntityId> = raw
            .assigned_station_ids
            .iter()
            .flatten()
            .cloned()
            .collect();
        if let Some(ref station) = raw.station {
            assigned_station_ids.insert(station.id.clone());
        }

        Self {
            user_id: raw.id.clone(),
            first_name,
            last_name,
            username,
            email,
            role: Role::parse_or_least(&raw.role),
            status,
            enabled,
            assigned_station_ids,
            login_time,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn is_assigned_to(&self, station_id: &EntityId) -> bool {
        self.assigned_station_ids.contains(station_id)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Token plus user; exists only when both halves are persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: CurrentUser,
}

/// Partial update merged over the stored user. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub status: Option<String>,
    pub enabled: Option<bool>,
    pub assigned_station_ids: Option<BTreeSet<EntityId>>,
}

impl SessionUpdate {
    fn apply(&self, user: &mut CurrentUser) {
        if let Some(ref v) = self.first_name {
            user.first_name = v.clone();
        }
        if let Some(ref v) = self.last_name {
            user.last_name = v.clone();
        }
        if let Some(ref v) = self.email {
            user.email = v.clone();
        }
        if let Some(v) = self.role {
            user.role = v;
        }
        if let Some(ref v) = self.status {
            user.status = v.clone();
        }
        if let Some(v) = self.enabled {
            user.enabled = v;
        }
        if let Some(ref v) = self.assigned_station_ids {
            user.assigned_station_ids = v.clone();
        }
    }
}

impl From<&ProfileUpdate> for SessionUpdate {
    fn from(update: &ProfileUpdate) -> Self {
        Self {
            first_name: update.first_name.clone(),
            last_name: update.last_name.clone(),
            email: update.email.clone(),
            ..Default::default()
        }
    }
}

/// Single source of truth for who is logged in.
///
/// Holds no state of its own: every read goes to the storage port, so two
/// stores over the same storage always agree. Clone is cheap and shares the
/// port.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn StoragePort>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    /// A store over fresh process-local storage.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Normalize an auth payload and persist token and user as a pair.
    ///
    /// If the user record cannot be written the token is removed again, so
    /// an error always means "no session".
    pub fn set_auth(&self, raw: &RawAuthPayload) -> Result<CurrentUser, SessionError> {
        let token = raw.token.trim();
        if token.is_empty() {
            return Err(SessionError::EmptyToken);
        }

        let user = CurrentUser::from_raw(raw, Utc::now());
        let user_json = serde_json::to_string(&user)?;

        self.storage.set(TOKEN_KEY, token)?;
        if let Err(e) = self.storage.set(USER_KEY, &user_json) {
            if let Err(rollback) = self.storage.remove(TOKEN_KEY) {
                warn!(error = %rollback, "Failed to roll back token after user write failed");
            }
            return Err(e.into());
        }

        debug!(username = %user.username, role = %user.role, "Session established");
        Ok(user)
    }

    /// The stored user, or `None` when missing or unreadable.
    pub fn current_user(&self) -> Option<CurrentUser> {
        let json = self.storage.get(USER_KEY)?;
        match serde_json::from_str(&json) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Stored user record is corrupt, ignoring it");
                None
            }
        }
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).filter(|t| !t.trim().is_empty())
    }

    pub fn session(&self) -> Option<Session> {
        let token = self.token()?;
        let user = self.current_user()?;
        Some(Session { token, user })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some() && self.current_user().is_some()
    }

    /// See [`token::is_expired_at`]. A missing token counts as expired.
    pub fn is_token_expired(&self) -> bool {
        self.is_token_expired_at(Utc::now())
    }

    pub fn is_token_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.token() {
            Some(token) => token::is_expired_at(&token, now),
            None => true,
        }
    }

    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        token::expiry(&self.token()?).ok()
    }

    pub fn is_session_valid(&self) -> bool {
        self.is_authenticated() && !self.is_token_expired()
    }

    /// Drop the session if its token has expired. Returns whether a usable
    /// session remains.
    pub fn ensure_valid(&self) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        if self.is_token_expired() {
            debug!("Token expired, clearing session");
            if let Err(e) = self.logout() {
                warn!(error = %e, "Failed to clear expired session");
            }
            return false;
        }
        true
    }

    /// Remove token and user. The remembered username is kept.
    pub fn logout(&self) -> Result<(), StorageError> {
        let token_result = self.storage.remove(TOKEN_KEY);
        let user_result = self.storage.remove(USER_KEY);
        token_result.and(user_result)
    }

    /// Merge `update` into the stored user. No-op without a session.
    pub fn update_user(&self, update: &SessionUpdate) -> Result<Option<CurrentUser>, SessionError> {
        let Some(mut user) = self.current_user() else {
            return Ok(None);
        };
        update.apply(&mut user);
        self.storage.set(USER_KEY, &serde_json::to_string(&user)?)?;
        Ok(Some(user))
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.current_user().map(|u| u.role == role).unwrap_or(false)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.current_user()
            .map(|u| roles.contains(&u.role))
            .unwrap_or(false)
    }

    /// Remember a username for login form autofill. Never a password.
    pub fn remember_username(&self, username: &str) -> Result<(), StorageError> {
        self.storage.set(REMEMBERED_USERNAME_KEY, username)
    }

    pub fn forget_username(&self) -> Result<(), StorageError> {
        self.storage.remove(REMEMBERED_USERNAME_KEY)
    }

    pub fn remembered_username(&self) -> Option<String> {
        self.storage.get(REMEMBERED_USERNAME_KEY)
    }
}
