//! REST API tests, driven through the router without a listener

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use passport_core::api::create_router;
use passport_core::{InMemoryCredentialStore, ADMIN_ROLE_ID, CUSTOMER_ROLE_ID};

use common::{seed_user, test_config};

fn test_app(store: &InMemoryCredentialStore) -> Router {
    let state = passport_core::with_store(&test_config(), Arc::new(store.clone())).unwrap();
    create_router(state)
}

struct TestResponse {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: Value,
}

async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    TestResponse { status, headers, body }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn sign_in(app: &Router, email: &str, password: &str) -> Value {
    let response = send(
        app,
        post_json("/v1/users/signin", json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "sign-in failed: {}", response.body);
    response.body
}

#[tokio::test]
async fn test_health_check_and_security_headers() {
    let app = test_app(&InMemoryCredentialStore::new());

    let response = send(&app, Request::get("/v1/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "passport-core");
    assert_eq!(response.headers["x-content-type-options"], "nosniff");
    assert_eq!(response.headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_unknown_route() {
    let app = test_app(&InMemoryCredentialStore::new());

    let response = send(&app, Request::get("/v2/nothing").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["trace_id"], "middleware-001");
}

#[tokio::test]
async fn test_sign_up_sign_in_and_profile() {
    let app = test_app(&InMemoryCredentialStore::new());

    let signup = send(
        &app,
        post_json(
            "/v1/users/signup",
            json!({ "email": "a@x.com", "username": "alice", "password": "correcthorse9" }),
        ),
    )
    .await;
    assert_eq!(signup.status, StatusCode::CREATED);
    assert_eq!(signup.body["user"]["role_id"], CUSTOMER_ROLE_ID);
    assert!(signup.body.get("token").is_none());
    assert!(signup.body["user"].get("password_hash").is_none());

    let passport = sign_in(&app, "a@x.com", "correcthorse9").await;
    let user_id = passport["user"]["id"].as_str().unwrap();
    let access = passport["token"]["access_token"].as_str().unwrap();

    let profile = send(&app, get_with_bearer(&format!("/v1/users/{}", user_id), access)).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["username"], "alice");

    // Someone else's profile
    let other = send(&app, get_with_bearer("/v1/users/someone-else", access)).await;
    assert_eq!(other.status, StatusCode::FORBIDDEN);

    let anonymous = send(
        &app,
        Request::get(format!("/v1/users/{}", user_id)).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["trace_id"], "middleware-002");
}

#[tokio::test]
async fn test_sign_in_failures_are_uniform() {
    let store = InMemoryCredentialStore::new();
    seed_user(&store, "a@x.com", "secret1", CUSTOMER_ROLE_ID);
    let app = test_app(&store);

    let wrong_password = send(
        &app,
        post_json("/v1/users/signin", json!({ "email": "a@x.com", "password": "nope" })),
    )
    .await;
    let unknown_email = send(
        &app,
        post_json("/v1/users/signin", json!({ "email": "z@x.com", "password": "nope" })),
    )
    .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_email.body);
    assert_eq!(wrong_password.body["trace_id"], "users-002");
    assert_eq!(store.session_count(), 0);
}

#[tokio::test]
async fn test_refresh_and_sign_out() {
    let store = InMemoryCredentialStore::new();
    seed_user(&store, "a@x.com", "secret1", CUSTOMER_ROLE_ID);
    let app = test_app(&store);

    let passport = sign_in(&app, "a@x.com", "secret1").await;
    let session_id = passport["token"]["id"].as_str().unwrap();
    let old_refresh = passport["token"]["refresh_token"].as_str().unwrap();

    let refreshed = send(
        &app,
        post_json("/v1/users/refresh", json!({ "refresh_token": old_refresh })),
    )
    .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert_eq!(refreshed.body["token"]["id"], session_id);
    assert_ne!(refreshed.body["token"]["refresh_token"], old_refresh);

    let replay = send(
        &app,
        post_json("/v1/users/refresh", json!({ "refresh_token": old_refresh })),
    )
    .await;
    assert_eq!(replay.status, StatusCode::NOT_FOUND);

    let signout_body = json!({ "oauth_id": session_id });
    let signout = send(&app, post_json("/v1/users/signout", signout_body.clone())).await;
    assert_eq!(signout.status, StatusCode::NO_CONTENT);
    assert_eq!(store.session_count(), 0);

    let again = send(&app, post_json("/v1/users/signout", signout_body)).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
    assert_eq!(again.body["trace_id"], "users-004");
}

#[tokio::test]
async fn test_sign_up_validation_and_conflicts() {
    let app = test_app(&InMemoryCredentialStore::new());

    let invalid = send(
        &app,
        post_json(
            "/v1/users/signup",
            json!({ "email": "not-an-email", "username": "alice", "password": "correcthorse9" }),
        ),
    )
    .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let body = json!({ "email": "a@x.com", "username": "alice", "password": "correcthorse9" });
    let created = send(&app, post_json("/v1/users/signup", body.clone())).await;
    assert_eq!(created.status, StatusCode::CREATED);

    let duplicate = send(&app, post_json("/v1/users/signup", body)).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.body["message"], "Username has been used");
}

#[tokio::test]
async fn test_admin_secret_requires_admin_role() {
    let store = InMemoryCredentialStore::new();
    seed_user(&store, "a@x.com", "secret1", CUSTOMER_ROLE_ID);
    seed_user(&store, "root@x.com", "rootpass1", ADMIN_ROLE_ID);
    let app = test_app(&store);

    let customer = sign_in(&app, "a@x.com", "secret1").await;
    let customer_access = customer["token"]["access_token"].as_str().unwrap();
    let denied = send(&app, get_with_bearer("/v1/users/admin/secret", customer_access)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.body["trace_id"], "middleware-004");

    let admin = sign_in(&app, "root@x.com", "rootpass1").await;
    let admin_access = admin["token"]["access_token"].as_str().unwrap();
    let granted = send(&app, get_with_bearer("/v1/users/admin/secret", admin_access)).await;
    assert_eq!(granted.status, StatusCode::OK);
    assert!(granted.body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_admin_sign_up_requires_admin_token() {
    let store = InMemoryCredentialStore::new();
    seed_user(&store, "root@x.com", "rootpass1", ADMIN_ROLE_ID);
    let app = test_app(&store);

    let body = json!({ "email": "ops@x.com", "username": "ops", "password": "correcthorse9" });

    let missing = send(&app, post_json("/v1/users/signup-admin", body.clone())).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    // An access token is signed with the wrong key for this header.
    let admin = sign_in(&app, "root@x.com", "rootpass1").await;
    let access = admin["token"]["access_token"].as_str().unwrap();
    let mut request = post_json("/v1/users/signup-admin", body.clone());
    request.headers_mut().insert("x-admin-token", access.parse().unwrap());
    assert_eq!(send(&app, request).await.status, StatusCode::UNAUTHORIZED);

    let secret = send(&app, get_with_bearer("/v1/users/admin/secret", access)).await;
    let admin_token = secret.body["token"].as_str().unwrap();
    let mut request = post_json("/v1/users/signup-admin", body);
    request.headers_mut().insert("x-admin-token", admin_token.parse().unwrap());
    let created = send(&app, request).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["user"]["role_id"], ADMIN_ROLE_ID);
}
