// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

use postpilot::config::Config;
use postpilot::db::RestDb;
use postpilot::middleware::auth::Claims;
use postpilot::routes::create_router;
use postpilot::services::{AuthApi, BillingApi, TurnstileVerifier};
use postpilot::AppState;
use std::sync::Arc;

/// Create a test app with offline mock collaborators.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default(), AuthApi::new_mock(), RestDb::new_mock())
}

/// Create a test app with a specific frontend origin (cookie attribute
/// tests) and offline mocks otherwise.
#[allow(dead_code)]
pub fn create_test_app_with_app_url(app_url: &str) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.app_url = app_url.trim_end_matches('/').to_string();
    create_test_app_with(config, AuthApi::new_mock(), RestDb::new_mock())
}

/// Create a test app whose auth backend and data API point at a stub
/// server origin.
#[allow(dead_code)]
pub fn create_test_app_with_backend(backend_url: &str) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    create_test_app_with(
        config.clone(),
        AuthApi::new(backend_url, &config.auth_anon_key),
        RestDb::new(backend_url, &config.auth_anon_key),
    )
}

/// Assemble the app from parts with the offline billing mock.
#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    auth: AuthApi,
    db: RestDb,
) -> (axum::Router, Arc<AppState>) {
    create_test_app_full(config, auth, db, BillingApi::new_mock())
}

#[allow(dead_code)]
pub fn create_test_app_full(
    config: Config,
    auth: AuthApi,
    db: RestDb,
    billing: BillingApi,
) -> (axum::Router, Arc<AppState>) {
    let turnstile = TurnstileVerifier::new(config.turnstile_secret_key.clone(), config.dev_mode);

    let state = Arc::new(AppState {
        config,
        auth,
        db,
        billing,
        turnstile,
    });

    (create_router(state.clone()), state)
}

/// Mint an access token the way the auth backend would (HS256 over the
/// shared JWT secret).
#[allow(dead_code)]
pub fn mint_access_token(user_id: &str, email: Option<&str>, secret: &[u8]) -> String {
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600,
        email: email.map(String::from),
        role: Some("authenticated".to_string()),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .unwrap()
}

/// Serve a stub collaborator on an ephemeral port, returning its origin.
#[allow(dead_code)]
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}
