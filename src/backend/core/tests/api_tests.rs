//! End-to-end tests for the HTTP API over the in-memory backend.
//!
//! Tests cover:
//! - Authentication (bearer, cookie, public paths, disabled auth)
//! - Validation and authorization ordering
//! - Resource CRUD, archive and hard delete
//! - Role-permission association add/remove semantics
//! - The full role editing scenario

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use backoffice_core::api::{build_router, AppState};
use backoffice_core::middleware::{AuthConfig, Authenticator};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-test-secret";

// ============================================================================
// Harness
// ============================================================================

struct TestApp {
    app: Router,
    state: AppState,
    admin: String,
}

impl TestApp {
    fn new() -> Self {
        let config = AuthConfig::builder().jwt_secret(SECRET).issuer("backoffice").build();
        let authenticator = Arc::new(Authenticator::new(config).unwrap());
        let admin = authenticator.issue("admin", Some("admin@example.com"), ["*"]).unwrap();
        let state = AppState::in_memory(authenticator);
        Self {
            app: build_router(state.clone()),
            state,
            admin,
        }
    }

    fn token(&self, permissions: &[&str]) -> String {
        self.state
            .authenticator
            .issue("limited", None, permissions.iter().copied())
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            tokio_test::assert_ok!(serde_json::from_slice::<Value>(&bytes))
        };
        (status, body)
    }

    async fn call_as(&self, token: &str, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token));
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let token = self.admin.clone();
        self.call_as(&token, method, uri, body).await
    }

    async fn create(&self, resource: &str, name: &str) -> String {
        let (status, body) = self.call(Method::POST, &format!("/{}", resource), Some(json!({"name": name}))).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["record"]["id"].as_str().unwrap().to_string()
    }

    async fn members(&self, role: &str) -> Vec<String> {
        let (status, body) = self.call(Method::GET, &format!("/roles/{}/permissions", role), None).await;
        assert_eq!(status, StatusCode::OK);
        ids(&body["records"])
    }
}

fn ids(records: &Value) -> Vec<String> {
    records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect()
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Request::get("/roles").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_bad_token_is_unauthorized() {
    let app = TestApp::new();
    let (status, _) = app.call_as("not-a-jwt", Method::GET, "/roles", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let app = TestApp::new();
    let request = Request::get("/roles")
        .header(header::COOKIE, format!("session={}", app.admin))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"records": [], "totalRecords": 0}));
}

#[tokio::test]
async fn test_disabled_auth_allows_everything() {
    let authenticator = Arc::new(Authenticator::new(AuthConfig::builder().enabled(false).build()).unwrap());
    let app = build_router(AppState::in_memory(authenticator));

    let request = Request::post("/roles")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"name": "Open"}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

// ============================================================================
// Validation and Authorization
// ============================================================================

#[tokio::test]
async fn test_invalid_id_is_bad_request() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/roles/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_id_returns_empty_record() {
    let app = TestApp::new();
    let uri = format!("/roles/{}", Uuid::new_v4());
    let (status, body) = app.call(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"record": null}));
}

#[tokio::test]
async fn test_forbidden_request_never_mutates() {
    let app = TestApp::new();
    let reader = app.token(&["roles:read"]);

    let (status, body) = app
        .call_as(&reader, Method::POST, "/roles", Some(json!({"name": "Sneaky"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = app
        .call_as(&reader, Method::POST, "/roles", Some(json!({"name": ""})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.call_as(&reader, Method::GET, "/roles", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalRecords"], 0);
}

#[tokio::test]
async fn test_forbidden_association_edit_keeps_members() {
    let app = TestApp::new();
    let role = app.create("roles", "Viewer").await;
    let permission = app.create("permissions", "roles:read").await;
    let reader = app.token(&["roles:read"]);

    let uri = format!("/roles/{}/permissions", role);
    let (status, _) = app
        .call_as(&reader, Method::PUT, &uri, Some(json!([permission])))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.members(&role).await.is_empty());
}

#[tokio::test]
async fn test_each_resource_checks_its_own_permissions() {
    let app = TestApp::new();
    let permission = app.create("permissions", "roles:read").await;
    let role_admin = app.token(&["roles:read", "roles:add", "roles:edit", "roles:delete"]);
    let permission_admin = app.token(&["permissions:delete"]);

    let archive = format!("/permissions/{}/archive", permission);
    let (status, _) = app.call_as(&role_admin, Method::POST, &archive, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call_as(&role_admin, Method::PATCH, &format!("/permissions/{}", permission), Some(json!({"name": "x"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call_as(&permission_admin, Method::POST, &archive, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["record"]["deleted_at"].is_string());

    let (status, _) = app
        .call_as(&permission_admin, Method::POST, "/roles", Some(json!({"name": "Editor"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_body_is_bad_request() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::POST, "/permissions", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["context"]["fields"]["body"].is_array());
}

// ============================================================================
// Resources
// ============================================================================

#[tokio::test]
async fn test_create_trims_and_lists() {
    let app = TestApp::new();
    let (status, body) = app
        .call(Method::POST, "/roles", Some(json!({"name": "  Editor  "})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["record"]["name"], "Editor");
    assert!(body["record"]["deleted_at"].is_null());

    let (_, list) = app.call(Method::GET, "/roles", None).await;
    assert_eq!(list["totalRecords"], 1);
    assert_eq!(list["records"][0]["name"], "Editor");
}

#[tokio::test]
async fn test_duplicate_name_is_constraint_violation() {
    let app = TestApp::new();
    app.create("roles", "Editor").await;
    let (status, body) = app.call(Method::POST, "/roles", Some(json!({"name": "Editor"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CONSTRAINT_VIOLATION");
}

#[tokio::test]
async fn test_patch_renames() {
    let app = TestApp::new();
    let id = app.create("permissions", "roles:read").await;
    let uri = format!("/permissions/{}", id);

    let (status, body) = app.call(Method::PATCH, &uri, Some(json!({"name": "roles:edit"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["name"], "roles:edit");

    let (status, body) = app.call(Method::PATCH, &uri, Some(json!({"name": " "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["context"]["fields"]["body.name"].is_array());
}

#[tokio::test]
async fn test_hard_delete_cascades_membership() {
    let app = TestApp::new();
    let role = app.create("roles", "Editor").await;
    let p1 = app.create("permissions", "a").await;
    let p2 = app.create("permissions", "b").await;
    app.call(Method::PUT, &format!("/roles/{}/permissions", role), Some(json!([p1, p2])))
        .await;

    let (status, body) = app.call(Method::DELETE, &format!("/permissions/{}", p1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["id"], p1.as_str());

    assert_eq!(app.members(&role).await, vec![p2]);

    let id = Uuid::parse_str(&p1).unwrap();
    assert!(app.state.permissions.lookup(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_archived_member_is_hidden() {
    let app = TestApp::new();
    let role = app.create("roles", "Editor").await;
    let p1 = app.create("permissions", "a").await;
    app.call(Method::PUT, &format!("/roles/{}/permissions", role), Some(json!([p1])))
        .await;

    app.call(Method::POST, &format!("/permissions/{}/archive", p1), None).await;
    assert!(app.members(&role).await.is_empty());
}

#[tokio::test]
async fn test_archive_twice_finds_nothing() {
    let app = TestApp::new();
    let id = app.create("roles", "Temp").await;
    let uri = format!("/roles/{}/archive", id);

    let (_, first) = app.call(Method::POST, &uri, None).await;
    assert!(first["record"]["deleted_at"].is_string());

    let (status, second) = app.call(Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(second["record"].is_null());
}

// ============================================================================
// Associations
// ============================================================================

#[tokio::test]
async fn test_add_unknown_member_is_bad_request() {
    let app = TestApp::new();
    let role = app.create("roles", "Editor").await;
    let uri = format!("/roles/{}/permissions", role);

    let (status, body) = app.call(Method::PUT, &uri, Some(json!([Uuid::new_v4()]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CONSTRAINT_VIOLATION");
}

#[tokio::test]
async fn test_add_to_unknown_owner_is_bad_request() {
    let app = TestApp::new();
    let permission = app.create("permissions", "a").await;
    let uri = format!("/roles/{}/permissions", Uuid::new_v4());

    let (status, _) = app.call(Method::PUT, &uri, Some(json!([permission]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_remove_requires_valid_ids() {
    let app = TestApp::new();
    let role = app.create("roles", "Editor").await;

    let uri = format!("/roles/{}/permissions?permissionIds=nope", role);
    let (status, _) = app.call(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/roles/{}/permissions", role);
    let (status, _) = app.call(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_remove_many_with_repeated_query() {
    let app = TestApp::new();
    let role = app.create("roles", "Editor").await;
    let p1 = app.create("permissions", "a").await;
    let p2 = app.create("permissions", "b").await;
    let p3 = app.create("permissions", "c").await;
    let uri = format!("/roles/{}/permissions", role);
    app.call(Method::PUT, &uri, Some(json!([p1, p2, p3]))).await;

    let remove = format!("{}?permissionIds={}&permissionIds={}", uri, p1, p3);
    let (status, body) = app.call(Method::DELETE, &remove, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["records"]), vec![p2]);
}

// ============================================================================
// Scenario
// ============================================================================

#[tokio::test]
async fn test_role_editing_scenario() {
    let app = TestApp::new();
    let p1 = app.create("permissions", "roles:read").await;
    let p2 = app.create("permissions", "roles:edit").await;

    // Create role
    let (status, body) = app.call(Method::POST, "/roles", Some(json!({"name": "Editor"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let role = body["record"]["id"].as_str().unwrap().to_string();
    assert!(Uuid::parse_str(&role).is_ok());

    let members_uri = format!("/roles/{}/permissions", role);

    // Add both permissions
    let (status, body) = app.call(Method::PUT, &members_uri, Some(json!([p1, p2]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["records"]), vec![p1.clone(), p2.clone()]);

    // Adding an existing pair fails and leaves the set alone
    let (status, _) = app.call(Method::PUT, &members_uri, Some(json!([p1]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.members(&role).await, vec![p1.clone(), p2.clone()]);

    // Remove one
    let remove = format!("{}?permissionIds={}", members_uri, p1);
    let (status, body) = app.call(Method::DELETE, &remove, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["records"]), vec![p2.clone()]);

    // Removing it again is a no-op
    let (status, body) = app.call(Method::DELETE, &remove, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["records"]), vec![p2.clone()]);

    // Archive the role
    let (status, body) = app.call(Method::POST, &format!("/roles/{}/archive", role), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["record"]["deleted_at"].is_string());

    let (_, list) = app.call(Method::GET, "/roles", None).await;
    assert_eq!(list["totalRecords"], 0);

    let (status, body) = app.call(Method::GET, &format!("/roles/{}", role), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["record"].is_null());

    // Still there for audit
    let stored = app
        .state
        .roles
        .lookup(Uuid::parse_str(&role).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_deleted());
    assert_eq!(stored.get("name"), Some(&json!("Editor")));
}
