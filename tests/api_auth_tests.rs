// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Authentication middleware tests for the protected API surface.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

async fn get_me(app: axum::Router, auth_header: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().uri("/api/me");
    if let Some(value) = auth_header {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_me_without_token_is_unauthorized() {
    let (app, _) = common::create_test_app();
    let response = get_me(app, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_with_garbage_token_is_unauthorized() {
    let (app, _) = common::create_test_app();
    let response = get_me(app, Some("Bearer not-a-jwt")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_with_wrong_signing_key_is_unauthorized() {
    let (app, _) = common::create_test_app();
    let token = common::mint_access_token("user-1", None, b"some_other_secret_entirely_here!");
    let response = get_me(app, Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_accepts_token_via_cookie() {
    let (app, state) = common::create_test_app();
    let token = common::mint_access_token("user-1", None, &state.config.jwt_secret);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::COOKIE, format!("pp-access-token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Auth passes; the offline data mock turns into a 500, not a 401.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_create_checkout_rejects_mismatched_user() {
    let (app, state) = common::create_test_app();
    let token = common::mint_access_token("user-1", Some("a@b.c"), &state.config.jwt_secret);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/stripe/create-checkout")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"userId":"someone-else","email":"a@b.c"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_checkout_rejects_invalid_email() {
    let (app, state) = common::create_test_app();
    let token = common::mint_access_token("user-1", None, &state.config.jwt_secret);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/stripe/create-checkout")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"userId":"user-1","email":"not-an-email"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
