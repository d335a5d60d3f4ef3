//! HTTP tests for the role authority client and store reconciliation.
//!
//! A wiremock server stands in for the role authority:
//! 1. GET /api/role-data with bearer and principal headers
//! 2. Retries on server errors, no retries on client errors
//! 3. POST /api/set-role with the selected role
//! 4. Store sync adopting remote data and pushing back a pending selection
//! 5. Store sync keeping local data when the remote record is malformed

use market_events::{EventBus, MemoryEventBus};
use market_rbac::Role;
use market_session::{
    AuthorityEndpoint, AuthorityError, HttpRoleAuthority, LocalCache, MemoryCache, RetryPolicy,
    RoleAuthority, RoleStateStore, DEFAULT_CACHE_KEY, PRINCIPAL_HEADER,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Authority client pointed at a mock server with fast retries.
fn client(server: &MockServer) -> HttpRoleAuthority {
    let endpoint = AuthorityEndpoint {
        base_url: server.uri(),
        api_key: Some("test-authority-key".to_string()),
    };

    HttpRoleAuthority::new(endpoint, Duration::from_secs(5))
        .unwrap()
        .with_retry(RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            exponential_base: 2.0,
        })
}

fn role_data_response(current: &str, available: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "currentRole": current,
        "availableRoles": available,
    }))
}

#[tokio::test]
async fn test_fetch_role_data_sends_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .and(header("Authorization", "Bearer test-authority-key"))
        .and(header(PRINCIPAL_HEADER, "principal-1"))
        .respond_with(role_data_response("advertiser", &["viewer", "advertiser"]))
        .expect(1)
        .mount(&server)
        .await;

    let data = client(&server).fetch_role_data(Some("principal-1")).await.unwrap();

    assert_eq!(data.current_role, "advertiser");
    assert_eq!(data.available_roles, vec!["viewer", "advertiser"]);
}

#[tokio::test]
async fn test_fetch_role_data_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).fetch_role_data(None).await;

    assert!(matches!(result, Err(AuthorityError::AuthenticationFailed)));
}

#[tokio::test]
async fn test_fetch_role_data_retries_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .respond_with(role_data_response("publisher", &["viewer", "publisher"]))
        .expect(1)
        .mount(&server)
        .await;

    let data = client(&server).fetch_role_data(None).await.unwrap();

    assert_eq!(data.current_role, "publisher");
}

#[tokio::test]
async fn test_fetch_role_data_does_not_retry_client_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such principal"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).fetch_role_data(Some("ghost")).await.unwrap_err();

    match err {
        AuthorityError::ApiError { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "no such principal");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_role_data_invalid_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let result = client(&server).fetch_role_data(None).await;

    assert!(matches!(result, Err(AuthorityError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_set_role_posts_selection_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/set-role"))
        .and(header(PRINCIPAL_HEADER, "principal-1"))
        .and(body_json(json!({"role": "publisher"})))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).set_role(Some("principal-1"), Role::Publisher).await;

    assert!(matches!(result, Err(AuthorityError::ApiError { status: 500, .. })));
}

#[tokio::test]
async fn test_store_sync_adopts_remote_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .respond_with(role_data_response("adv", &["viewer", "adv", "publisher"]))
        .mount(&server)
        .await;

    let store = RoleStateStore::new(Arc::new(MemoryCache::new()))
        .with_authority(Arc::new(client(&server)))
        .with_principal("principal-1");
    store
        .set_role_data(&json!({"currentRole": "publisher", "availableRoles": ["viewer", "publisher"]}))
        .unwrap();

    let data = store.sync_with_server().await;

    assert_eq!(data.current_role, Role::Advertiser);
    assert_eq!(
        data.available_roles,
        vec![Role::Viewer, Role::Advertiser, Role::Publisher]
    );
    assert_eq!(store.current_role(), Role::Advertiser);
}

#[tokio::test]
async fn test_store_sync_pushes_pending_selection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .respond_with(role_data_response("advertiser", &["viewer", "advertiser", "publisher"]))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/set-role"))
        .and(body_json(json!({"role": "publisher"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = RoleStateStore::new(Arc::new(MemoryCache::new()))
        .with_authority(Arc::new(client(&server)))
        .with_principal("principal-1");
    store
        .set_role_data(&json!({"currentRole": "viewer", "availableRoles": ["viewer", "publisher"]}))
        .unwrap();
    assert!(store.set_current_role_in_local_context(Role::Publisher));

    let data = store.sync_with_server().await;

    assert_eq!(data.current_role, Role::Publisher);
    assert!(!data.pending_selection);
    assert!(data.has_role(Role::Advertiser));
}

#[tokio::test]
async fn test_store_sync_keeps_local_state_when_unreachable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let store = RoleStateStore::new(Arc::new(MemoryCache::new()))
        .with_authority(Arc::new(client(&server)))
        .with_principal("principal-1");
    store
        .set_role_data(&json!({"currentRole": "stakeholder", "availableRoles": ["viewer", "stakeholder"]}))
        .unwrap();

    let data = store.sync_with_server().await;

    assert_eq!(data.current_role, Role::Stakeholder);
    assert_eq!(data.available_roles, vec![Role::Viewer, Role::Stakeholder]);
}

#[tokio::test]
async fn test_fetch_role_data_missing_available_roles_is_invalid() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"currentRole": "publisher"})))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).fetch_role_data(None).await;

    assert!(matches!(result, Err(AuthorityError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_store_sync_rejects_response_without_available_roles() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"currentRole": "publisher"})))
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let store = RoleStateStore::new(cache.clone())
        .with_authority(Arc::new(client(&server)))
        .with_principal("principal-1");
    let before = store
        .set_role_data(&json!({"currentRole": "publisher", "availableRoles": ["viewer", "publisher"]}))
        .unwrap();
    let cached = cache.get(DEFAULT_CACHE_KEY);

    let data = store.sync_with_server().await;

    assert_eq!(data, before);
    assert_eq!(store.get_role_data(), before);
    assert_eq!(cache.get(DEFAULT_CACHE_KEY), cached);
}

#[tokio::test]
async fn test_store_sync_rejects_response_with_only_unknown_roles() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/role-data"))
        .respond_with(role_data_response("overlord", &["janitor"]))
        .mount(&server)
        .await;

    let bus = Arc::new(MemoryEventBus::new());
    let mut failures = bus.subscribe("role.sync_failed").await.unwrap();
    let store = RoleStateStore::new(Arc::new(MemoryCache::new()))
        .with_authority(Arc::new(client(&server)))
        .with_principal("principal-1")
        .with_events(bus);
    let before = store
        .set_role_data(&json!({"currentRole": "publisher", "availableRoles": ["viewer", "publisher"]}))
        .unwrap();

    let data = store.sync_with_server().await;

    assert_eq!(data, before);
    assert_eq!(store.current_role(), Role::Publisher);
    assert_eq!(store.available_roles(), vec![Role::Viewer, Role::Publisher]);
    assert!(failures.try_recv().is_some());
}
