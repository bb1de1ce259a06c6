// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Turnstile verification route tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::post,
    Json, Router,
};
use postpilot::config::Config;
use postpilot::db::RestDb;
use postpilot::services::{AuthApi, BillingApi, TurnstileVerifier};
use postpilot::AppState;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

mod common;

async fn verify(app: axum::Router, body: &str) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/verify-turnstile")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn production_config() -> Config {
    let mut config = Config::test_default();
    config.dev_mode = false;
    config.turnstile_secret_key = "turnstile_secret".to_string();
    config
}

/// Production-mode app whose verifier points at `origin`.
fn app_with_verifier(origin: &str) -> axum::Router {
    let config = production_config();
    let turnstile = TurnstileVerifier::new(config.turnstile_secret_key.clone(), false)
        .with_base_url(origin);

    let state = Arc::new(AppState {
        config,
        auth: AuthApi::new_mock(),
        db: RestDb::new_mock(),
        billing: BillingApi::new_mock(),
        turnstile,
    });
    postpilot::routes::create_router(state)
}

#[tokio::test]
async fn test_dev_mode_bypasses_verification() {
    let (app, _) = common::create_test_app();

    let response = verify(app, r#"{"token":"anything"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["dev-mode"], true);
}

#[tokio::test]
async fn test_missing_token_is_rejected_in_production() {
    let (app, _) = common::create_test_app_with(
        production_config(),
        AuthApi::new_mock(),
        RestDb::new_mock(),
    );

    let response = verify(app, r#"{}"#).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_widget_field_name_is_accepted() {
    let siteverify = Router::new().route(
        "/turnstile/v0/siteverify",
        post(|| async { Json(json!({ "success": true })) }),
    );
    let origin = common::spawn_server(siteverify).await;
    let app = app_with_verifier(&origin);

    let response = verify(app, r#"{"cf-turnstile-response":"tok"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_failed_challenge_is_rejected() {
    let siteverify = Router::new().route(
        "/turnstile/v0/siteverify",
        post(|| async {
            Json(json!({ "success": false, "error-codes": ["invalid-input-response"] }))
        }),
    );
    let origin = common::spawn_server(siteverify).await;
    let app = app_with_verifier(&origin);

    let response = verify(app, r#"{"token":"bad"}"#).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unreachable_verifier_returns_service_unavailable() {
    // Nothing listens on port 9; connections fail fast.
    let app = app_with_verifier("http://127.0.0.1:9");

    let response = verify(app, r#"{"token":"tok"}"#).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}
