// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP surface tests.
//!
//! These tests verify that:
//! 1. User routes reject requests without a valid session token
//! 2. Session tokens are accepted from the cookie or the bearer header
//! 3. Scheduler routes require the shared secret
//! 4. Vehicle routes return telemetry and connection state

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use tesla_tracker::middleware::auth::{create_jwt, SESSION_COOKIE};
use tesla_tracker::time_utils::now_epoch;
use tower::ServiceExt;

mod common;
use common::{wake_body, Scripted, TestHarness};

const VEHICLE_ID: &str = "33015387032628850";

fn session(h: &TestHarness, user_id: &str) -> String {
    create_jwt(user_id, &h.state.config.jwt_signing_key).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let h = TestHarness::new();

    let response = h
        .app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let h = TestHarness::new();

    let response = h
        .app()
        .oneshot(Request::builder().uri("/api/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_wrong_key() {
    let h = TestHarness::new();
    let token = create_jwt("7", b"some_other_signing_key_entirely!").unwrap();

    let response = h
        .app()
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_with_bearer_token() {
    let h = TestHarness::new();

    let response = h
        .app()
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", session(&h, "7")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user_id"], "7");
    assert_eq!(body["connected"], false);
    assert!(body["expires_at"].is_null());
}

#[tokio::test]
async fn test_me_with_cookie_when_connected() {
    let h = TestHarness::new();
    h.connect("7", "current", 8 * 3600).await;

    let response = h
        .app()
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(
                    header::COOKIE,
                    format!("{}={}", SESSION_COOKIE, session(&h, "7")),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["connected"], true);
    assert!(body["expires_at"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_login_start_returns_authorize_url() {
    let h = TestHarness::new();

    let response = h
        .app()
        .oneshot(
            Request::builder()
                .uri("/auth/tesla/login")
                .header(header::AUTHORIZATION, format!("Bearer {}", session(&h, "7")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let url = body["authorize_url"].as_str().unwrap();
    assert!(url.contains("code_challenge_method=S256"));
    assert!(url.ends_with(&format!("state={}", body["state"].as_str().unwrap())));
}

#[tokio::test]
async fn test_callback_with_bad_url_is_rejected() {
    let h = TestHarness::new();

    let response = h
        .app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/tesla/callback")
                .header(header::AUTHORIZATION, format!("Bearer {}", session(&h, "7")))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"redirect_url": "nonsense"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_vehicle_detail_with_fresh_snapshot() {
    let h = TestHarness::new();
    h.add_vehicle("7", VEHICLE_ID).await;
    h.add_snapshot(
        "7",
        VEHICLE_ID,
        json!({"usable_battery_level": 72, "est_battery_range": 210.7}),
        now_epoch(),
    )
    .await;

    let response = h
        .app()
        .oneshot(
            Request::builder()
                .uri(format!("/api/vehicles/{}", VEHICLE_ID))
                .header(header::AUTHORIZATION, format!("Bearer {}", session(&h, "7")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["vehicle_id"], VEHICLE_ID);
    assert_eq!(body["battery_level"], 72);
    assert_eq!(body["estimated_range"], 210);
    assert_eq!(body["sync"], "fresh");
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn test_other_users_vehicle_is_not_found() {
    let h = TestHarness::new();
    h.add_vehicle("8", VEHICLE_ID).await;

    let response = h
        .app()
        .oneshot(
            Request::builder()
                .uri(format!("/api/vehicles/{}", VEHICLE_ID))
                .header(header::AUTHORIZATION, format!("Bearer {}", session(&h, "7")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wakeup_route() {
    let h = TestHarness::new();
    h.connect("7", "current", 8 * 3600).await;
    h.add_vehicle("7", VEHICLE_ID).await;
    h.transport
        .on("/wake_up", vec![Scripted::json(200, wake_body("online"))]);

    let response = h
        .app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/vehicles/{}/wakeup", VEHICLE_ID))
                .header(header::AUTHORIZATION, format!("Bearer {}", session(&h, "7")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["online"], true);
}

// ─── Scheduler Routes ────────────────────────────────────────

fn sync_request(secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/tasks/sync-vehicle")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        builder = builder.header("X-Tasks-Secret", secret);
    }
    builder
        .body(Body::from(
            json!({"vehicle_id": VEHICLE_ID, "user_id": "7"}).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_tasks_require_secret() {
    let h = TestHarness::new();

    let missing = h.app().oneshot(sync_request(None)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::FORBIDDEN);

    let wrong = h.app().oneshot(sync_request(Some("guess"))).await.unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

    // A user session is not a substitute for the secret.
    let mut with_jwt = sync_request(None);
    with_jwt.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", session(&h, "7")).parse().unwrap(),
    );
    let response = h.app().oneshot(with_jwt).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tasks_sync_with_secret() {
    let h = TestHarness::new();
    h.add_vehicle("7", VEHICLE_ID).await;
    h.add_snapshot("7", VEHICLE_ID, json!({}), now_epoch()).await;

    let response = h
        .app()
        .oneshot(sync_request(Some("test_tasks_secret")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["outcome"], "fresh");
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let h = TestHarness::new();

    let response = h
        .app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
}

#[tokio::test]
async fn test_cors_preflight_for_frontend() {
    let h = TestHarness::new();

    let response = h
        .app()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/me")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:5173"
    );
}
