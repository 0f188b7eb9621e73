mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use lingoquiz::api;
use lingoquiz::config::Config;
use lingoquiz::domain::Role;
use lingoquiz::state::SharedState;

use common::{PASSWORD, create_user, setup_with, test_config};

async fn app_with(config: Config) -> (Router, Arc<SharedState>) {
    let shared = Arc::new(setup_with(config).await);
    let state = api::create_app_state(shared.clone(), None);
    (api::router(state).await, shared)
}

async fn app() -> (Router, Arc<SharedState>) {
    app_with(test_config()).await
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, headers, json)
}

async fn login(app: &Router, identifier: &str) -> String {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": identifier, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["tokens"]["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

fn test_body() -> Value {
    json!({
        "category_id": 2,
        "difficulty_id": 1,
        "is_public": true,
        "translations": [
            { "language": "en", "title": "Capitals" },
            { "language": "pl", "title": "Stolice" }
        ],
        "questions": [{
            "question_type": "multiple_choice",
            "translations": [{ "language": "en", "content": "Capital of France?" }],
            "answers": [
                { "is_correct": true, "translations": [{ "language": "en", "content": "Paris" }] },
                { "is_correct": false, "translations": [{ "language": "en", "content": "Lyon" }] }
            ]
        }]
    })
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = app().await;

    let (status, headers, body) = send(&app, Method::GET, "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], true);
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_catalog_is_public() {
    let (app, _) = app().await;

    let (status, _, body) = send(&app, Method::GET, "/api/languages", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["code"].as_str())
        .collect();
    assert!(codes.contains(&"en"));
    assert!(codes.contains(&"pl"));

    let (status, _, body) = send(&app, Method::GET, "/api/difficulties", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    let (app, _) = app().await;

    let (status, _, body) = send(&app, Method::GET, "/api/tests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _, _) = send(&app, Method::GET, "/api/auth/me", Some("1.garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let (app, _) = app().await;

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": "nina", "email": "nina@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "user");

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": "nina", "email": "other@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "USERNAME_TAKEN");

    let token = login(&app, "nina@example.com").await;
    let (status, _, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "nina");

    let (status, _, body) = send(&app, Method::GET, "/api/metrics", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let (app, shared) = app().await;
    create_user(&shared, "cora", Role::User).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "username": "cora", "password": PASSWORD }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let refresh_token = body["data"]["tokens"]["refresh_token"].as_str().unwrap().to_string();

    let me_with_cookie = || {
        Request::builder()
            .uri("/api/auth/me")
            .header(header::COOKIE, cookie.clone())
            .body(Body::empty())
            .unwrap()
    };
    let response = app.clone().oneshot(me_with_cookie()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Reuse of the login's refresh token revokes its family, and the session with it
    for _ in 0..2 {
        send(
            &app,
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh_token })),
        )
        .await;
    }
    let response = app.clone().oneshot(me_with_cookie()).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_change_ends_cookie_sessions() {
    let (app, shared) = app().await;
    create_user(&shared, "pia", Role::User).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "username": "pia", "password": PASSWORD }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string();

    let token = login(&app, "pia").await;
    let (status, _, _) = send(
        &app,
        Method::PUT,
        "/api/auth/password",
        Some(&token),
        Some(json!({ "current_password": PASSWORD, "new_password": "another-horse-43" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rotation_over_http() {
    let (app, shared) = app().await;
    create_user(&shared, "rita", Role::User).await;

    let (_, _, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "rita", "password": PASSWORD })),
    )
    .await;
    let refresh_token = body["data"]["tokens"]["refresh_token"].as_str().unwrap().to_string();

    let (status, _, rotated) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_access = rotated["data"]["access_token"].as_str().unwrap().to_string();

    // Replaying the old refresh token burns the whole family
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_REUSED");

    let (status, _, _) = send(&app, Method::GET, "/api/auth/me", Some(&new_access), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_lockout_sets_retry_after() {
    let mut config = test_config();
    config.security.auth_throttle.max_attempts = 2;
    let (app, shared) = app_with(config).await;
    create_user(&shared, "lara", Role::User).await;

    for _ in 0..2 {
        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "lara", "password": "nope-nope-nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }

    let (status, headers, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "lara", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "TOO_MANY_ATTEMPTS");
    assert!(headers.contains_key(header::RETRY_AFTER));
}

#[tokio::test]
async fn test_authoring_and_taking_a_test() {
    let (app, shared) = app().await;
    create_user(&shared, "maker", Role::Creator).await;
    create_user(&shared, "player", Role::User).await;
    let maker = login(&app, "maker").await;
    let player = login(&app, "player").await;

    let (status, _, _) = send(&app, Method::POST, "/api/tests", Some(&player), Some(test_body())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut missing_category = test_body();
    missing_category["category_id"] = Value::Null;
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/tests",
        Some(&maker),
        Some(missing_category),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CATEGORY_REQUIRED");

    let (status, _, body) = send(&app, Method::POST, "/api/tests", Some(&maker), Some(test_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let test_id = body["data"]["id"].as_i64().unwrap();

    let (status, _, body) = send(
        &app,
        Method::GET,
        &format!("/api/tests/{test_id}?lang=pl"),
        Some(&player),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Stolice");
    assert!(body["data"]["questions"][0]["answers"][0].get("is_correct").is_none());

    let (status, _, body) = send(
        &app,
        Method::GET,
        &format!("/api/tests/{test_id}?lang=zz"),
        Some(&player),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "LANGUAGE_NOT_FOUND");

    let (status, _, started) = send(
        &app,
        Method::POST,
        &format!("/api/tests/{test_id}/attempts"),
        Some(&player),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let attempt_id = started["data"]["attempt_id"].as_i64().unwrap();
    let question = &started["data"]["questions"][0];
    let paris = question["answers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["content"] == "Paris")
        .unwrap()["id"]
        .clone();

    let submission = json!({
        "answers": [{ "question_id": question["id"], "answer_id": paris }]
    });
    let (status, _, result) = send(
        &app,
        Method::POST,
        &format!("/api/attempts/{attempt_id}/submit"),
        Some(&player),
        Some(submission.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["data"]["score"], 100.0);
    assert_eq!(result["data"]["status"], "finished");

    let (status, _, body) = send(
        &app,
        Method::POST,
        &format!("/api/attempts/{attempt_id}/submit"),
        Some(&player),
        Some(submission),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ATTEMPT_FINISHED");

    let (status, _, body) = send(&app, Method::GET, "/api/attempts", Some(&player), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    // Someone else's attempt looks like a missing one
    let (status, _, _) = send(
        &app,
        Method::GET,
        &format!("/api/attempts/{attempt_id}"),
        Some(&maker),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_endpoints() {
    let (app, shared) = app().await;
    let victim = create_user(&shared, "victim", Role::User).await;
    create_user(&shared, "chief", Role::Admin).await;
    let admin = login(&app, "chief").await;
    let victim_token = login(&app, "victim").await;

    let (status, _, body) = send(&app, Method::GET, "/api/admin/users?search=vic", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/admin/users/bulk",
        Some(&admin),
        Some(json!({ "user_ids": [victim.id], "action": "block" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["processed"], 1);

    let (status, _, _) = send(&app, Method::GET, "/api/auth/me", Some(&victim_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/admin/users/bulk",
        Some(&admin),
        Some(json!({ "user_ids": [victim.id], "action": "promote" })),
    )
    .await;
    assert!(status.is_client_error(), "unexpected {status}: {body}");

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/admin/tokens/cleanup?retention_days=30",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 0);

    let (status, _, _) = send(&app, Method::GET, "/api/system/logs", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app, Method::GET, "/api/system/logs", Some(&victim_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
