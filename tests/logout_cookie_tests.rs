// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Logout cookie attribute tests.
//!
//! These tests verify cookie removal attributes on logout match the
//! creation attributes for localhost and production-style app origins.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use tower::ServiceExt;

mod common;

fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

async fn logout(app: axum::Router) -> Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/auth/logout")
            .header(
                header::COOKIE,
                "pp-access-token=test; pp-refresh-token=test; pp-logged-in=1",
            )
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_logout_cookie_removal_localhost_attributes() {
    let (app, _) = common::create_test_app_with_app_url("http://localhost:3000");

    let response = logout(app).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let set_cookies = set_cookie_headers(&response);
    let access_cookie = find_cookie(&set_cookies, "pp-access-token");
    let refresh_cookie = find_cookie(&set_cookies, "pp-refresh-token");
    let hint_cookie = find_cookie(&set_cookies, "pp-logged-in");

    assert!(access_cookie.contains("Path=/"));
    assert!(access_cookie.contains("HttpOnly"));
    assert!(access_cookie.contains("SameSite=Lax"));
    assert!(access_cookie.contains("Max-Age=0"));
    assert!(!access_cookie.contains("Secure"));
    assert!(!access_cookie.contains("Domain="));

    assert!(refresh_cookie.contains("Path=/"));
    assert!(refresh_cookie.contains("HttpOnly"));
    assert!(refresh_cookie.contains("Max-Age=0"));

    assert!(hint_cookie.contains("Path=/"));
    assert!(hint_cookie.contains("SameSite=Lax"));
    assert!(hint_cookie.contains("Max-Age=0"));
    assert!(!hint_cookie.contains("HttpOnly"));
    assert!(!hint_cookie.contains("Secure"));
    assert!(!hint_cookie.contains("Domain="));
}

#[tokio::test]
async fn test_logout_cookie_removal_production_domain_attributes() {
    let (app, _) = common::create_test_app_with_app_url("https://app.postpilot.dev");

    let response = logout(app).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let set_cookies = set_cookie_headers(&response);
    let access_cookie = find_cookie(&set_cookies, "pp-access-token");
    let hint_cookie = find_cookie(&set_cookies, "pp-logged-in");

    assert!(access_cookie.contains("Path=/"));
    assert!(access_cookie.contains("HttpOnly"));
    assert!(access_cookie.contains("SameSite=Lax"));
    assert!(access_cookie.contains("Max-Age=0"));
    assert!(access_cookie.contains("Secure"));
    assert!(!access_cookie.contains("Domain="));

    assert!(hint_cookie.contains("Path=/"));
    assert!(hint_cookie.contains("SameSite=Lax"));
    assert!(hint_cookie.contains("Max-Age=0"));
    assert!(hint_cookie.contains("Secure"));
    assert!(
        hint_cookie.contains("Domain=.postpilot.dev") || hint_cookie.contains("Domain=postpilot.dev")
    );
    assert!(!hint_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_logout_without_cookies_still_succeeds() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
