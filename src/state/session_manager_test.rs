use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::net::api::{LOGIN_PATH, LOGOUT_PATH, PROFILE_PATH};
use crate::net::mock_transport::MockTransport;
use crate::net::transport::Method;
use crate::state::session::SessionPhase;
use crate::state::token_store::MemoryTokenStore;

// =============================================================
// Helpers
// =============================================================

fn alice_profile() -> serde_json::Value {
    json!({ "id": "u1", "username": "alice", "roles": ["Administrator"] })
}

fn manager(mock: &Arc<MockTransport>, store: &Arc<MemoryTokenStore>) -> SessionManager {
    let api = ApiClient::new(mock.clone(), "http://api.test/api/v1");
    SessionManager::new(api, store.clone())
}

/// Backend that accepts alice's login with `tok1` and serves her profile.
fn happy_backend() -> Arc<MockTransport> {
    let mock = Arc::new(MockTransport::new());
    mock.respond(Method::Post, LOGIN_PATH, 200, json!({ "access_token": "tok1" }));
    mock.respond(Method::Get, PROFILE_PATH, 200, alice_profile());
    mock
}

struct ReadOnlyStore;

impl TokenStore for ReadOnlyStore {
    fn save(&self, _token: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read-only".to_owned()))
    }

    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn clear(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// =============================================================
// restore_from_storage
// =============================================================

#[tokio::test]
async fn new_manager_starts_loading() {
    let mgr = manager(&happy_backend(), &Arc::new(MemoryTokenStore::new()));
    assert_eq!(mgr.session().phase(), SessionPhase::Loading);
}

#[tokio::test]
async fn restore_without_token_settles_unauthenticated_without_requests() {
    let mock = happy_backend();
    let mut mgr = manager(&mock, &Arc::new(MemoryTokenStore::new()));

    mgr.restore_from_storage().await;

    assert_eq!(mgr.session().phase(), SessionPhase::Unauthenticated);
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn restore_with_valid_token_authenticates() {
    let mock = happy_backend();
    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let mut mgr = manager(&mock, &store);

    mgr.restore_from_storage().await;

    let session = mgr.session();
    assert_eq!(session.phase(), SessionPhase::Authenticated);
    assert_eq!(session.user().unwrap().username, "alice");
    assert_eq!(mock.requests_to(Method::Get, PROFILE_PATH)[0].bearer.as_deref(), Some("tok1"));
}

#[tokio::test]
async fn restore_with_stale_token_clears_store_and_header() {
    let mock = Arc::new(MockTransport::new());
    mock.respond(Method::Get, PROFILE_PATH, 401, json!({ "detail": "Could not validate credentials" }));
    let store = Arc::new(MemoryTokenStore::with_token("stale"));
    let mut mgr = manager(&mock, &store);

    mgr.restore_from_storage().await;

    let session = mgr.session();
    assert!(!session.is_authenticated());
    assert!(!session.is_loading());
    assert_eq!(session.last_error(), None);
    assert_eq!(store.load().unwrap(), None);
    assert!(!mgr.api().has_auth_token());
}

#[tokio::test]
async fn restore_network_failure_also_clears() {
    let mock = Arc::new(MockTransport::new());
    mock.fail(Method::Get, PROFILE_PATH, ApiError::Network("timed out".into()));
    let store = Arc::new(MemoryTokenStore::with_token("tok1"));
    let mut mgr = manager(&mock, &store);

    mgr.restore_from_storage().await;

    assert_eq!(mgr.session().phase(), SessionPhase::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn restore_keeps_token_when_request_cannot_be_sent() {
    let mock = Arc::new(MockTransport::new());
    mock.fail(
        Method::Get,
        PROFILE_PATH,
        ApiError::InvalidRequest("/api/v1/users/me/profile: relative URL without a base".into()),
    );
    let store = Arc::new(MemoryTokenStore::with_token("valid-token"));
    let mut mgr = manager(&mock, &store);

    mgr.restore_from_storage().await;

    assert_eq!(mgr.session().phase(), SessionPhase::Unauthenticated);
    assert_eq!(store.load().unwrap().as_deref(), Some("valid-token"));
    assert!(!mgr.api().has_auth_token());
}

// =============================================================
// login
// =============================================================

#[tokio::test]
async fn login_persists_token_and_loads_profile() {
    let mock = happy_backend();
    let store = Arc::new(MemoryTokenStore::new());
    let mut mgr = manager(&mock, &store);
    mgr.restore_from_storage().await;

    let profile = mgr.login("alice", "pw").await.unwrap();

    assert_eq!(profile.id, "u1");
    let session = mgr.session();
    assert!(session.is_authenticated());
    assert_eq!(session.user().unwrap().roles.iter().collect::<Vec<_>>(), vec!["Administrator"]);
    assert_eq!(store.load().unwrap().as_deref(), Some("tok1"));
    assert_eq!(mock.requests_to(Method::Post, LOGIN_PATH)[0].bearer, None);
    assert_eq!(mock.requests_to(Method::Get, PROFILE_PATH)[0].bearer.as_deref(), Some("tok1"));
}

#[tokio::test]
async fn login_then_reload_reaches_same_state() {
    let mock = happy_backend();
    let store = Arc::new(MemoryTokenStore::new());
    let mut first = manager(&mock, &store);
    first.login("alice", "pw").await.unwrap();
    let after_login = first.session();

    let mut reloaded = manager(&mock, &store);
    reloaded.restore_from_storage().await;

    assert_eq!(reloaded.session(), after_login);
}

#[tokio::test]
async fn login_without_token_is_auth_error() {
    let mock = Arc::new(MockTransport::new());
    mock.respond(Method::Post, LOGIN_PATH, 200, json!({ "message": "ok" }));
    let store = Arc::new(MemoryTokenStore::new());
    let mut mgr = manager(&mock, &store);

    let err = mgr.login("alice", "pw").await.unwrap_err();

    assert!(matches!(err, SessionError::Auth));
    let session = mgr.session();
    assert_eq!(session.phase(), SessionPhase::Unauthenticated);
    assert_eq!(session.last_error(), Some("Login failed. Please check your credentials."));
    assert_eq!(store.load().unwrap(), None);
    assert!(mock.requests_to(Method::Get, PROFILE_PATH).is_empty());
}

#[tokio::test]
async fn login_rejected_surfaces_backend_message() {
    let mock = Arc::new(MockTransport::new());
    mock.respond(Method::Post, LOGIN_PATH, 401, json!({ "message": "Incorrect username or password" }));
    let mut mgr = manager(&mock, &Arc::new(MemoryTokenStore::new()));

    let err = mgr.login("alice", "wrong").await.unwrap_err();

    assert!(matches!(err, SessionError::Api(ApiError::Api { status: 401, .. })));
    assert_eq!(mgr.session().last_error(), Some("Incorrect username or password"));
}

#[tokio::test]
async fn login_profile_failure_is_distinct_and_not_logged_in() {
    let mock = Arc::new(MockTransport::new());
    mock.respond(Method::Post, LOGIN_PATH, 200, json!({ "access_token": "tok1" }));
    mock.respond(Method::Get, PROFILE_PATH, 500, json!({ "message": "db down" }));
    let store = Arc::new(MemoryTokenStore::new());
    let mut mgr = manager(&mock, &store);

    let err = mgr.login("alice", "pw").await.unwrap_err();

    assert!(matches!(err, SessionError::ProfileUnavailable(ApiError::Api { status: 500, .. })));
    let session = mgr.session();
    assert!(!session.is_authenticated());
    assert_eq!(session.last_error(), Some("Login successful, but failed to load user profile."));
    assert_eq!(store.load().unwrap(), None);
    assert!(!mgr.api().has_auth_token());
}

#[tokio::test]
async fn login_store_failure_aborts_before_profile_fetch() {
    let mock = happy_backend();
    let api = ApiClient::new(mock.clone(), "http://api.test/api/v1");
    let mut mgr = SessionManager::new(api, Arc::new(ReadOnlyStore));

    let err = mgr.login("alice", "pw").await.unwrap_err();

    assert!(matches!(err, SessionError::Store(StoreError::Unavailable(_))));
    assert!(!mgr.session().is_authenticated());
    assert!(mock.requests_to(Method::Get, PROFILE_PATH).is_empty());
}

#[tokio::test]
async fn failed_login_after_success_drops_previous_user() {
    let mock = happy_backend();
    let store = Arc::new(MemoryTokenStore::new());
    let mut mgr = manager(&mock, &store);
    mgr.login("alice", "pw").await.unwrap();

    mock.respond(Method::Post, LOGIN_PATH, 401, json!({ "message": "nope" }));
    mgr.login("alice", "wrong").await.unwrap_err();

    assert!(!mgr.session().is_authenticated());
    assert_eq!(store.load().unwrap(), None);
}

// =============================================================
// logout + clear_error
// =============================================================

#[tokio::test]
async fn logout_clears_even_when_backend_unreachable() {
    let mock = happy_backend();
    mock.fail(Method::Post, LOGOUT_PATH, ApiError::Network("connection refused".into()));
    let store = Arc::new(MemoryTokenStore::new());
    let mut mgr = manager(&mock, &store);
    mgr.login("alice", "pw").await.unwrap();

    mgr.logout().await;

    let session = mgr.session();
    assert_eq!(session.phase(), SessionPhase::Unauthenticated);
    assert!(session.user().is_none());
    assert_eq!(store.load().unwrap(), None);
    assert!(!mgr.api().has_auth_token());
    assert_eq!(mock.requests_to(Method::Post, LOGOUT_PATH)[0].bearer.as_deref(), Some("tok1"));
}

#[tokio::test]
async fn logout_is_idempotent_and_skips_backend_without_token() {
    let mock = happy_backend();
    let mut mgr = manager(&mock, &Arc::new(MemoryTokenStore::new()));
    mgr.restore_from_storage().await;

    mgr.logout().await;
    mgr.logout().await;

    assert_eq!(mgr.session().phase(), SessionPhase::Unauthenticated);
    assert!(mock.requests_to(Method::Post, LOGOUT_PATH).is_empty());
}

#[tokio::test]
async fn clear_error_keeps_auth_state() {
    let mock = Arc::new(MockTransport::new());
    mock.respond(Method::Post, LOGIN_PATH, 401, json!({ "message": "bad" }));
    let mut mgr = manager(&mock, &Arc::new(MemoryTokenStore::new()));
    mgr.login("alice", "pw").await.unwrap_err();
    let before = mgr.session();

    mgr.clear_error();

    let after = mgr.session();
    assert_eq!(after.last_error(), None);
    assert_eq!(after.is_authenticated(), before.is_authenticated());
    assert_eq!(after.is_loading(), before.is_loading());
}

// =============================================================
// refresh_profile + notifications
// =============================================================

#[tokio::test]
async fn refresh_without_token_is_not_authenticated() {
    let mut mgr = manager(&happy_backend(), &Arc::new(MemoryTokenStore::new()));
    assert!(matches!(mgr.refresh_profile().await, Err(SessionError::NotAuthenticated)));
}

#[tokio::test]
async fn refresh_failure_ends_session() {
    let mock = happy_backend();
    let store = Arc::new(MemoryTokenStore::new());
    let mut mgr = manager(&mock, &store);
    mgr.login("alice", "pw").await.unwrap();

    mock.respond(Method::Get, PROFILE_PATH, 401, json!({ "detail": "Token expired" }));
    let err = mgr.refresh_profile().await.unwrap_err();

    assert!(matches!(err, SessionError::ProfileUnavailable(ref e) if e.is_unauthorized()));
    assert_eq!(mgr.session().phase(), SessionPhase::Unauthenticated);
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn refresh_local_failure_keeps_session_and_token() {
    let mock = happy_backend();
    let store = Arc::new(MemoryTokenStore::new());
    let mut mgr = manager(&mock, &store);
    mgr.login("alice", "pw").await.unwrap();

    mock.fail(Method::Get, PROFILE_PATH, ApiError::InvalidRequest("bad url".into()));
    let err = mgr.refresh_profile().await.unwrap_err();

    assert!(matches!(err, SessionError::ProfileUnavailable(ref e) if e.is_local()));
    assert_eq!(mgr.session().phase(), SessionPhase::Authenticated);
    assert_eq!(mgr.session().user().unwrap().username, "alice");
    assert_eq!(store.load().unwrap().as_deref(), Some("tok1"));
    assert!(mgr.api().has_auth_token());
}

#[tokio::test]
async fn subscribers_see_settled_state() {
    let mock = happy_backend();
    let mut mgr = manager(&mock, &Arc::new(MemoryTokenStore::new()));
    let mut rx = mgr.subscribe();
    assert!(rx.borrow().is_loading());

    mgr.login("alice", "pw").await.unwrap();

    assert!(rx.has_changed().unwrap());
    let seen = rx.borrow_and_update().clone();
    assert!(seen.is_authenticated());
    assert!(!seen.is_loading());
}
