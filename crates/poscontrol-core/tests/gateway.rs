//! End-to-end gateway behavior against a mock backend.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use poscontrol_core::api::ApiGateway;
use poscontrol_core::auth::SessionStore;
use poscontrol_core::config::Config;
use poscontrol_core::models::{
    EntityId, ProfileUpdate, RawAuthPayload, SigninRequest, StationRequest,
};
use poscontrol_core::Role;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_expiring_in(minutes: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
    let claims = json!({"sub": "jdoe", "exp": (Utc::now() + Duration::minutes(minutes)).timestamp()});
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.sig", header, payload)
}

/// Helper: gateway pointing at the mock server with a fresh session.
fn gateway(server: &MockServer, quarantined: &[&str]) -> ApiGateway {
    let config = Config {
        api_base_url: format!("{}/api", server.uri()),
        quarantined_user_ids: quarantined.iter().map(|s| s.to_string()).collect(),
        ..Config::default()
    };
    ApiGateway::new(&config, SessionStore::in_memory()).expect("gateway builds")
}

fn json_body(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/json")
}

#[tokio::test]
async fn login_stores_normalized_session_and_token_is_sent_afterwards() {
    let server = MockServer::start().await;
    let token = token_expiring_in(60);

    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .and(body_json(json!({"username": "jdoe", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": token,
            "username": "jdoe",
            "role": "STORE_MANAGER",
            "assignedStationIds": [1, 2]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/admin/stations"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Front", "ipAddress": "10.0.0.2", "printerName": "Epson"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server, &[]);
    let user = gateway.login("jdoe", "secret").await.into_result().unwrap();
    assert_eq!(user.role, Role::Manager);
    assert_eq!(user.email, "jdoe@example.com");
    assert_eq!(user.first_name, "jdoe");
    assert!(gateway.session().is_authenticated());
    assert!(!gateway.session().is_token_expired());

    let stations = gateway.get_stations().await;
    assert!(stations.success, "{:?}", stations.error);
    let stations = stations.data.unwrap();
    assert_eq!(stations[0].printer_name.as_deref(), Some("Epson"));
}

#[tokio::test]
async fn signin_failure_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})))
        .mount(&server)
        .await;

    let gateway = gateway(&server, &[]);
    let envelope = gateway.signin(&SigninRequest::new("jdoe", "wrong")).await;
    assert!(!envelope.success);
    assert_eq!(envelope.error.as_deref(), Some("Invalid credentials"));
    assert!(envelope.data.is_none());

    let login = gateway.login("jdoe", "wrong").await;
    assert!(!login.success);
    assert!(!gateway.session().is_authenticated());
}

#[tokio::test]
async fn circular_artifact_in_station_list_is_recovered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/stations"))
        .respond_with(json_body(r#"[{"id":4,"name":"Patio","location":"Outside"}]}]}]}]}"#))
        .mount(&server)
        .await;

    let gateway = gateway(&server, &[]);
    let stations = gateway.get_stations().await.into_result().unwrap();
    assert_eq!(stations.len(), 1);
    assert_eq!(stations[0].id, EntityId::from(4));
    assert_eq!(stations[0].display_name(), "Patio");
}

#[tokio::test]
async fn unrecoverable_body_is_named_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/stores"))
        .respond_with(json_body(r#"[{"id":1,"manager":{"stores":[{"id":1,"manager":]}]}]}"#))
        .mount(&server)
        .await;

    let gateway = gateway(&server, &[]);
    let envelope = gateway.get_stores().await;
    assert!(!envelope.success);
    assert_eq!(
        envelope.error.as_deref(),
        Some("JSON parsing failed: Circular reference detected")
    );
}

#[tokio::test]
async fn user_list_never_contains_quarantined_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "username": "alice", "role": "ADMIN"},
            {"id": 666, "username": "ghost", "role": "SUPER_ADMIN"},
            {"id": 2, "username": "bob", "role": "CASHIER", "assignedStationIds": [4]}
        ])))
        .mount(&server)
        .await;

    let gateway = gateway(&server, &["666"]);
    let users = gateway.get_all_users().await.into_result().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.id != EntityId::from(666)));
    assert_eq!(users[1].assigned_station_ids, vec![EntityId::from(4)]);
}

#[tokio::test]
async fn connection_failure_resolves_to_failure_envelope() {
    // Bind then drop a listener so the port is known to be closed.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = Config {
        api_base_url: format!("http://{}/api", addr),
        ..Config::default()
    };
    let gateway = ApiGateway::new(&config, SessionStore::in_memory()).unwrap();

    let envelope = gateway.get_all_users().await;
    assert!(!envelope.success);
    assert!(envelope.error.is_some_and(|e| !e.is_empty()));

    let health = gateway.health().await;
    assert!(!health.success);
}

#[tokio::test]
async fn forgot_password_sends_email_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/forgot-password"))
        .and(query_param("email", "a+b@shop.test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Reset link sent"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server, &[]);
    let envelope = gateway.forgot_password("a+b@shop.test").await;
    assert!(envelope.success);
    assert_eq!(envelope.data, Some(json!("Reset link sent")));
}

#[tokio::test]
async fn profile_update_is_mirrored_into_session() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/users/me"))
        .and(body_json(json!({"firstName": "Janet"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 5, "username": "jdoe", "firstName": "Janet", "role": "ADMIN"
        })))
        .mount(&server)
        .await;

    let gateway = gateway(&server, &[]);
    let raw: RawAuthPayload = serde_json::from_value(json!({
        "token": token_expiring_in(30), "username": "jdoe", "role": "ADMIN", "id": 5
    }))
    .unwrap();
    gateway.session().set_auth(&raw).unwrap();

    let update = ProfileUpdate {
        first_name: Some("Janet".to_string()),
        ..Default::default()
    };
    let envelope = gateway.update_profile(&update).await;
    assert!(envelope.success, "{:?}", envelope.error);
    assert_eq!(gateway.session().current_user().unwrap().first_name, "Janet");
}

#[tokio::test]
async fn station_create_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/admin/stations"))
        .and(body_json(json!({"name": "Till 3", "location": "Aisle 9"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 9, "name": "Till 3", "location": "Aisle 9", "status": "ACTIVE"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/admin/stations/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server, &[]);
    let created = gateway
        .create_station(&StationRequest {
            name: "Till 3".to_string(),
            location: Some("Aisle 9".to_string()),
            ..Default::default()
        })
        .await
        .into_result()
        .unwrap();
    assert_eq!(created.status.as_deref(), Some("ACTIVE"));

    let deleted = gateway.delete_station(&created.id).await;
    assert!(deleted.success);
}

#[tokio::test]
async fn payload_of_wrong_shape_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/loginHistory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let gateway = gateway(&server, &[]);
    let envelope = gateway.get_login_history().await;
    assert!(!envelope.success);
    assert!(envelope.error.unwrap().starts_with("Invalid response:"));
}

#[tokio::test]
async fn health_probe_accepts_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("UP"))
        .mount(&server)
        .await;

    let gateway = gateway(&server, &[]);
    let health = gateway.health().await.into_result().unwrap();
    assert!(health.reachable);
    assert_eq!(health.status.as_deref(), Some("UP"));
}
