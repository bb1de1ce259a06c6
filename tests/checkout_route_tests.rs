// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Checkout and subscription-management route tests against a stub Stripe.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::post,
    Json, Router,
};
use postpilot::config::Config;
use postpilot::db::RestDb;
use postpilot::services::{AuthApi, BillingApi};
use serde_json::json;
use tower::ServiceExt;

mod common;

fn stub_stripe(owner: &'static str) -> Router {
    let subscription = move || {
        json!({
            "id": "sub_123",
            "status": "active",
            "customer": "cus_1",
            "cancel_at_period_end": true,
            "current_period_end": chrono::Utc::now().timestamp() + 86_400,
            "metadata": { "user_id": owner }
        })
    };

    Router::new()
        .route(
            "/v1/checkout/sessions",
            post(|| async {
                Json(json!({
                    "id": "cs_test_1",
                    "url": "https://pay.example/session/abc"
                }))
            }),
        )
        .route(
            "/v1/subscriptions/{id}",
            post(move || async move { Json(subscription()) })
                .get(move || async move { Json(subscription()) }),
        )
}

fn stub_data_api() -> Router {
    Router::new().route(
        "/rest/v1/subscriptions",
        post(|| async { StatusCode::CREATED }),
    )
}

fn failing_stripe() -> Router {
    Router::new().route(
        "/v1/checkout/sessions",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": { "message": "No such price" } })),
            )
        }),
    )
}

async fn app_with_stripe(stripe: Router, owner_db: bool) -> (axum::Router, String) {
    let stripe_url = common::spawn_server(stripe).await;
    let config = Config::test_default();

    let db = if owner_db {
        let db_url = common::spawn_server(stub_data_api()).await;
        RestDb::new(&db_url, &config.auth_anon_key)
    } else {
        RestDb::new_mock()
    };

    let billing = BillingApi::new(
        config.stripe_secret_key.clone(),
        config.stripe_price_id.clone(),
        config.app_url.clone(),
    )
    .with_base_url(&stripe_url);

    let (app, state) = common::create_test_app_full(config, AuthApi::new_mock(), db, billing);
    let token = common::mint_access_token("user-1", Some("a@b.c"), &state.config.jwt_secret);
    (app, token)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_create_checkout_returns_hosted_url() {
    let (app, token) = app_with_stripe(stub_stripe("user-1"), false).await;

    let response = app
        .oneshot(post_json(
            "/api/stripe/create-checkout",
            &token,
            r#"{"userId":"user-1","email":"a@b.c","isTrialCheckout":true}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["url"], "https://pay.example/session/abc");
}

#[tokio::test]
async fn test_create_checkout_surfaces_stripe_failure() {
    let (app, token) = app_with_stripe(failing_stripe(), false).await;

    let response = app
        .oneshot(post_json(
            "/api/stripe/create-checkout",
            &token,
            r#"{"userId":"user-1","email":"a@b.c"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "stripe_error");
    assert_eq!(body["details"], "No such price");
}

#[tokio::test]
async fn test_cancel_subscription_reconciles_row() {
    let (app, token) = app_with_stripe(stub_stripe("user-1"), true).await;

    let response = app
        .oneshot(post_json(
            "/api/stripe/cancel",
            &token,
            r#"{"subscriptionId":"sub_123"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["subscription"]["stripe_subscription_id"], "sub_123");
    assert_eq!(body["subscription"]["cancel_at_period_end"], true);
    assert_eq!(body["subscription"]["status"], "active");
}

#[tokio::test]
async fn test_sync_rejects_foreign_subscription() {
    // The processor says this subscription belongs to someone else.
    let (app, token) = app_with_stripe(stub_stripe("other-user"), true).await;

    let response = app
        .oneshot(post_json(
            "/api/stripe/sync",
            &token,
            r#"{"subscriptionId":"sub_123"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sync_requires_subscription_id() {
    let (app, token) = app_with_stripe(stub_stripe("user-1"), true).await;

    let response = app
        .oneshot(post_json(
            "/api/stripe/sync",
            &token,
            r#"{"subscriptionId":""}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
