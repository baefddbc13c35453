//! API Integration Tests
//!
//! Every test drives the router over in-memory stores; no external services
//! are needed.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use warden_api::{create_router_for_testing, create_router_for_testing_with_state};
use warden_core::{Role, TokenKind};

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn bearer_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let mut request = create_json_request(method, uri, body);
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn register(app: &Router, username: &str, email: &str) -> (StatusCode, Value) {
    send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({
                "username": username,
                "password": "s3cret",
                "email": email,
            })),
        ),
    )
    .await
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "username": username, "password": password })),
        ),
    )
    .await
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let (status, json) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let (app, state) = create_router_for_testing_with_state();

    let (status, json) = send(
        &app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["credential_store"], true);

    state.set_ready(false);
    let (status, _) = send(
        &app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_counts_requests() {
    let app = create_router_for_testing();

    login(&app, "nobody", "pw").await;
    let (status, json) = send(
        &app,
        Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["total_requests"].as_u64().unwrap() >= 1);
    assert_eq!(
        json["endpoints"]["POST /api/v1/auth/login"]["status_counts"]["401"],
        1
    );
}

#[tokio::test]
async fn test_openapi_document() {
    let app = create_router_for_testing();

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/v1/auth/login"].is_object());
    assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn test_security_headers() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
}

// =============================================================================
// Session Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_register_login_verify_logout() {
    let app = create_router_for_testing();

    let (status, json) = register(&app, "alice", "a@ex.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["user"]["username"], "alice");
    assert_eq!(json["user"]["role"], "user");
    assert!(json["user"].get("password_digest").is_none());
    assert!(json.get("access_token").is_none());

    let (status, json) = login(&app, "alice", "s3cret").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 3600);
    let access = json["access_token"].as_str().unwrap().to_string();
    assert!(json["refresh_token"].is_string());

    let (status, json) = send(&app, bearer_request("GET", "/api/v1/auth/verify", &access, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["username"], "alice");
    assert_eq!(json["user"]["email"], "a@ex.com");

    let (status, json) = send(&app, bearer_request("POST", "/api/v1/auth/logout", &access, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({}));

    let (status, json) = send(&app, bearer_request("GET", "/api/v1/auth/verify", &access, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_logout_revokes_supplied_refresh_token() {
    let app = create_router_for_testing();
    register(&app, "carol", "c@ex.com").await;
    let (_, json) = login(&app, "carol", "s3cret").await;
    let access = json["access_token"].as_str().unwrap().to_string();
    let refresh = json["refresh_token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        bearer_request(
            "POST",
            "/api/v1/auth/logout",
            &access,
            Some(json!({ "refresh_token": refresh })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, bearer_request("POST", "/api/v1/auth/refresh", &refresh, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_requires_bearer() {
    let app = create_router_for_testing();

    let (status, json) = send(&app, create_json_request("POST", "/api/v1/auth/logout", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_refresh_token_kinds() {
    let app = create_router_for_testing();
    register(&app, "bob", "b@ex.com").await;
    let (_, json) = login(&app, "bob", "s3cret").await;
    let access = json["access_token"].as_str().unwrap().to_string();
    let refresh = json["refresh_token"].as_str().unwrap().to_string();

    let (status, _) = send(&app, bearer_request("POST", "/api/v1/auth/refresh", &access, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(&app, bearer_request("POST", "/api/v1/auth/refresh", &refresh, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["token_type"], "Bearer");
    assert!(json.get("refresh_token").is_none());
    let renewed = json["access_token"].as_str().unwrap().to_string();

    let (status, json) = send(&app, bearer_request("GET", "/api/v1/auth/verify", &renewed, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["username"], "bob");

    // A refresh token is not an access token
    let (status, _) = send(&app, bearer_request("GET", "/api/v1/auth/verify", &refresh, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_unknown_subject() {
    let (app, state) = create_router_for_testing_with_state();
    register(&app, "dave", "d@ex.com").await;
    let (_, json) = login(&app, "dave", "s3cret").await;
    let access = json["access_token"].as_str().unwrap().to_string();

    state.auth.delete_user("dave").await.unwrap();

    let (status, json) = send(&app, bearer_request("GET", "/api/v1/auth/verify", &access, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

// =============================================================================
// Failure Mapping Tests
// =============================================================================

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = create_router_for_testing();
    register(&app, "alice", "a@ex.com").await;

    let (wrong_status, wrong_body) = login(&app, "alice", "nope").await;
    let (unknown_status, unknown_body) = login(&app, "mallory", "nope").await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = create_router_for_testing();
    register(&app, "alice", "a@ex.com").await;

    let (status, json) = register(&app, "alice", "other@ex.com").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "Username already exists");

    let (status, json) = register(&app, "alicia", "a@ex.com").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "Email already exists");
}

#[tokio::test]
async fn test_register_rejects_invalid_input() {
    let app = create_router_for_testing();

    let (status, json) = register(&app, "bad name!", "a@ex.com").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");

    let (status, _) = register(&app, "alice", "not-an-email").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({ "username": "alice", "email": "a@ex.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_invalid_input() {
    let app = create_router_for_testing();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_garbage_bearer_is_unauthorized() {
    let app = create_router_for_testing();

    let (status, json) = send(&app, bearer_request("GET", "/api/v1/auth/verify", "garbage", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Authentication required");
}

#[tokio::test]
async fn test_refresh_uses_current_role() {
    let (app, state) = create_router_for_testing_with_state();
    let (status, _) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({
                "username": "root",
                "password": "s3cret",
                "email": "r@ex.com",
                "role": "admin",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, json) = login(&app, "root", "s3cret").await;
    let refresh = json["refresh_token"].as_str().unwrap().to_string();

    state.auth.set_role("root", Role::User).await.unwrap();

    let (status, json) = send(&app, bearer_request("POST", "/api/v1/auth/refresh", &refresh, None)).await;
    assert_eq!(status, StatusCode::OK);
    let identity = state
        .auth
        .verify(json["access_token"].as_str().unwrap(), TokenKind::Access)
        .await
        .unwrap();
    assert_eq!(identity.role, Role::User);

    state.auth.delete_user("root").await.unwrap();

    let (status, json) = send(&app, bearer_request("POST", "/api/v1/auth/refresh", &refresh, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_metrics_bucket_unmatched_paths() {
    let (app, state) = create_router_for_testing_with_state();

    for i in 0..200 {
        let method = if i % 2 == 0 { "GET" } else { "PATCH" };
        let (status, _) = send(
            &app,
            Request::builder()
                .method(method)
                .uri(format!("/nope-{i}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    for i in 0..50 {
        let (status, _) = send(
            &app,
            Request::builder()
                .method(format!("X{i}").as_str())
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
    login(&app, "nobody", "pw").await;

    let stats = state.endpoint_stats().await;
    assert_eq!(stats.len(), 3);
    assert_eq!(stats["<unmatched>"].requests, 200);
    assert_eq!(stats["OTHER /health"].requests, 50);
    assert_eq!(stats["POST /api/v1/auth/login"].requests, 1);
}
