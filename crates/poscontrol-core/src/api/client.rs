//! API gateway for the point-of-sale backend.
//!
//! This module provides the `ApiGateway` struct for making authenticated
//! requests and converting every outcome into an `ApiEnvelope`.

use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use reqwest::{header, Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{decode, graph, ApiEnvelope, GatewayError};
use crate::auth::{CurrentUser, SessionStore, SessionUpdate};
use crate::config::Config;
use crate::models::{
    CreateUserRequest, EntityId, LoginHistoryEntry, ProfileUpdate, RawAuthPayload,
    ResetPasswordRequest, SigninRequest, SignupRequest, StationRef, StationRequest, StoreRecord,
    StoreRequest, UpdateUserRequest, UserRecord,
};

/// Connectivity probe result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct HealthStatus {
    pub reachable: bool,
    pub status: Option<String>,
}

/// Typed access to the backend REST API.
///
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and the session store shares its storage port.
#[derive(Clone)]
pub struct ApiGateway {
    client: Client,
    base_url: String,
    session: SessionStore,
    quarantined_user_ids: HashSet<EntityId>,
}

impl ApiGateway {
    /// Create a gateway from configuration, reading the bearer token from
    /// `session` on every request.
    pub fn new(config: &Config, session: SessionStore) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
            quarantined_user_ids: config
                .quarantined_user_ids
                .iter()
                .map(|id| EntityId::new(id.trim()))
                .collect(),
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn headers(&self) -> Result<header::HeaderMap, GatewayError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(token) = self.session.token() {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| GatewayError::InvalidRequest(format!("bad bearer token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn execute(&self, method: Method, url: String, body: Option<Value>) -> Result<Value, GatewayError> {
        let mut request = self.client.request(method.clone(), &url).headers(self.headers()?);
        if let Some(ref body) = body {
            request = request.json(body);
        }

        debug!(method = %method, url = %url, "Sending request");
        let response = request.send().await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await?;
        debug!(method = %method, url = %url, status, bytes = text.len(), "Response received");

        decode::decode(status, content_type.as_deref(), &text)
    }

    async fn dispatch(&self, method: Method, url: String, body: Option<Value>) -> ApiEnvelope<Value> {
        let envelope = capture(self.execute(method.clone(), url.clone(), body)).await;
        if let Some(ref error) = envelope.error {
            debug!(method = %method, url = %url, error = %error, "Request failed");
        }
        envelope
    }

    /// Generic authenticated request against a path under the base URL.
    pub async fn authenticated_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiEnvelope<Value> {
        self.dispatch(method, self.url(path), body).await
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<Value>) -> ApiEnvelope<T> {
        self.authenticated_request(method, path, body)
            .await
            .and_then(from_payload)
    }

    async fn call_with<T: DeserializeOwned, B: Serialize>(&self, method: Method, path: &str, body: &B) -> ApiEnvelope<T> {
        match serde_json::to_value(body) {
            Ok(body) => self.call(method, path, Some(body)).await,
            Err(e) => ApiEnvelope::err(GatewayError::InvalidRequest(e.to_string()).to_string()),
        }
    }

    // ===== Authentication =====

    pub async fn signup(&self, request: &SignupRequest) -> ApiEnvelope<RawAuthPayload> {
        self.call_with(Method::POST, "/auth/signup", request).await
    }

    pub async fn signin(&self, request: &SigninRequest) -> ApiEnvelope<RawAuthPayload> {
        self.call_with(Method::POST, "/auth/signin", request).await
    }

    /// Sign in and store the resulting session.
    pub async fn login(&self, username: &str, password: &str) -> ApiEnvelope<CurrentUser> {
        let request = SigninRequest::new(username, password);
        let session = self.session.clone();
        self.signin(&request).await.and_then(|raw| {
            session
                .set_auth(&raw)
                .map_err(|e| GatewayError::Internal(format!("Failed to store session: {}", e)))
        })
    }

    pub async fn forgot_password(&self, email: &str) -> ApiEnvelope<Value> {
        match Url::parse_with_params(&self.url("/auth/forgot-password"), &[("email", email)]) {
            Ok(url) => self.dispatch(Method::POST, url.to_string(), None).await,
            Err(e) => ApiEnvelope::err(GatewayError::InvalidRequest(e.to_string()).to_string()),
        }
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> ApiEnvelope<Value> {
        self.call_with(Method::POST, "/auth/reset-password", request).await
    }

    // ===== Current user =====

    pub async fn current_user(&self) -> ApiEnvelope<UserRecord> {
        self.call(Method::GET, "/users/me", None).await
    }

    /// Update the logged-in user's profile and mirror the change into the
    /// session store.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiEnvelope<UserRecord> {
        let envelope: ApiEnvelope<UserRecord> = self.call_with(Method::PUT, "/users/me", update).await;
        if envelope.is_success() {
            if let Err(e) = self.session.update_user(&SessionUpdate::from(update)) {
                warn!(error = %e, "Profile saved but session copy not updated");
            }
        }
        envelope
    }

    // ===== Users =====

    /// List users, dropping records that are quarantined, still circular or
    /// do not match the user shape.
    pub async fn get_all_users(&self) -> ApiEnvelope<Vec<UserRecord>> {
        self.authenticated_request(Method::GET, "/auth/users", None)
            .await
            .and_then(|value| self.sanitize_users(value))
    }

    fn sanitize_users(&self, value: Value) -> Result<Vec<UserRecord>, GatewayError> {
        let Value::Array(items) = value else {
            return Err(GatewayError::InvalidResponse("expected a list of users".to_string()));
        };

        let total = items.len();
        let mut users = Vec::with_capacity(total);
        for item in items {
            let id = item
                .get("id")
                .and_then(|id| serde_json::from_value::<EntityId>(id.clone()).ok());
            if let Some(ref id) = id {
                if self.quarantined_user_ids.contains(id) {
                    warn!(user_id = %id, "Dropping quarantined user record");
                    continue;
                }
            }
            if graph::contains_sentinel(&item) {
                warn!(user_id = ?id, "Dropping user record with circular structure");
                continue;
            }
            match serde_json::from_value::<UserRecord>(item) {
                Ok(user) => users.push(user),
                Err(e) => warn!(user_id = ?id, error = %e, "Dropping malformed user record"),
            }
        }

        if users.len() < total {
            debug!(kept = users.len(), total, "Filtered user list");
        }
        Ok(users)
    }

    pub async fn create_user(&self, request: &CreateUserRequest) -> ApiEnvelope<UserRecord> {
        self.call_with(Method::POST, "/auth/users", request).await
    }

    pub async fn update_user(&self, id: &EntityId, request: &UpdateUserRequest) -> ApiEnvelope<UserRecord> {
        self.call_with(Method::PUT, &format!("/auth/users/{}", id), request).await
    }

    pub async fn delete_user(&self, id: &EntityId) -> ApiEnvelope<()> {
        self.authenticated_request(Method::DELETE, &format!("/auth/users/{}", id), None)
            .await
            .map(|_| ())
    }

    pub async fn get_login_history(&self) -> ApiEnvelope<Vec<LoginHistoryEntry>> {
        self.call(Method::GET, "/admin/loginHistory", None).await
    }

    // ===== Stations =====

    pub async fn get_stations(&self) -> ApiEnvelope<Vec<StationRef>> {
        self.call(Method::GET, "/admin/stations", None).await
    }

    pub async fn get_station(&self, id: &EntityId) -> ApiEnvelope<StationRef> {
        self.call(Method::GET, &format!("/admin/stations/{}", id), None).await
    }

    pub async fn create_station(&self, request: &StationRequest) -> ApiEnvelope<StationRef> {
        self.call_with(Method::POST, "/admin/stations", request).await
    }

    pub async fn update_station(&self, id: &EntityId, request: &StationRequest) -> ApiEnvelope<StationRef> {
        self.call_with(Method::PUT, &format!("/admin/stations/{}", id), request).await
    }

    pub async fn delete_station(&self, id: &EntityId) -> ApiEnvelope<()> {
        self.authenticated_request(Method::DELETE, &format!("/admin/stations/{}", id), None)
            .await
            .map(|_| ())
    }

    // ===== Stores =====

    pub async fn get_stores(&self) -> ApiEnvelope<Vec<StoreRecord>> {
        self.call(Method::GET, "/admin/stores", None).await
    }

    pub async fn get_store(&self, id: &EntityId) -> ApiEnvelope<StoreRecord> {
        self.call(Method::GET, &format!("/admin/stores/{}", id), None).await
    }

    pub async fn create_store(&self, request: &StoreRequest) -> ApiEnvelope<StoreRecord> {
        self.call_with(Method::POST, "/admin/stores", request).await
    }

    pub async fn update_store(&self, id: &EntityId, request: &StoreRequest) -> ApiEnvelope<StoreRecord> {
        self.call_with(Method::PUT, &format!("/admin/stores/{}", id), request).await
    }

    pub async fn delete_store(&self, id: &EntityId) -> ApiEnvelope<()> {
        self.authenticated_request(Method::DELETE, &format!("/admin/stores/{}", id), None)
            .await
            .map(|_| ())
    }

    // ===== Health =====

    /// Probe `/health`. Any 2xx counts as reachable.
    pub async fn health(&self) -> ApiEnvelope<HealthStatus> {
        self.authenticated_request(Method::GET, "/health", None)
            .await
            .map(|value| HealthStatus {
                reachable: true,
                status: health_status_text(&value),
            })
    }
}

/// Run a request future to completion, converting every failure, including
/// a panic while decoding, into a failure envelope.
async fn capture<F>(future: F) -> ApiEnvelope<Value>
where
    F: Future<Output = Result<Value, GatewayError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result.into(),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "Unexpected error while handling response".to_string());
            warn!(error = %message, "Request handling panicked");
            ApiEnvelope::err(GatewayError::Internal(message).to_string())
        }
    }
}

fn from_payload<T: DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

fn health_status_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(_) => value.get("status").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
