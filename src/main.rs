// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! PostPilot API Server
//!
//! Backend for the PostPilot web application: OAuth sign-in, Stripe
//! checkout and subscription management, Turnstile verification and the
//! aggregated user-data endpoint.

use postpilot::{
    config::Config,
    db::RestDb,
    services::{AuthApi, BillingApi, TurnstileVerifier},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting PostPilot API");

    // Auth backend client (anon key; user tokens ride per-request)
    let auth = AuthApi::new(&config.auth_url, &config.auth_anon_key);
    tracing::info!(auth_url = %config.auth_url, "Auth backend client initialized");

    // Data API client
    let db = RestDb::new(&config.auth_url, &config.auth_anon_key);

    // Stripe client
    let billing = BillingApi::new(
        config.stripe_secret_key.clone(),
        config.stripe_price_id.clone(),
        config.app_url.clone(),
    );
    tracing::info!(price_id = %config.stripe_price_id, "Stripe client initialized");

    // Turnstile verifier
    let turnstile = TurnstileVerifier::new(config.turnstile_secret_key.clone(), config.dev_mode);
    if config.dev_mode {
        tracing::warn!("Development mode: Turnstile verification is bypassed");
    }

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        auth,
        db,
        billing,
        turnstile,
    });

    // Build router
    let app = postpilot::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("postpilot=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
