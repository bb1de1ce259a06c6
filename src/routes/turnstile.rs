// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Turnstile verification route.

use crate::error::AppError;
use crate::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/verify-turnstile", post(verify))
}

/// The widget posts the token under its own field name; plain clients use
/// `token`.
#[derive(Deserialize)]
pub struct VerifyRequest {
    #[serde(default, rename = "cf-turnstile-response")]
    pub cf_turnstile_response: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Serialize, Default)]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", rename = "dev-mode")]
    pub dev_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Verify a challenge token before a credentialed sign-in is honored.
async fn verify(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyRequest>,
) -> (StatusCode, Json<VerifyResponse>) {
    if state.turnstile.dev_mode() {
        tracing::debug!("Development mode - skipping Turnstile verification");
        return (
            StatusCode::OK,
            Json(VerifyResponse {
                success: true,
                dev_mode: Some(true),
                error: None,
            }),
        );
    }

    let Some(token) = payload.cf_turnstile_response.or(payload.token) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(VerifyResponse {
                success: false,
                dev_mode: None,
                error: Some("Turnstile token is required".to_string()),
            }),
        );
    };

    match state.turnstile.verify(&token).await {
        Ok(true) => (
            StatusCode::OK,
            Json(VerifyResponse {
                success: true,
                ..Default::default()
            }),
        ),
        Ok(false) => (
            StatusCode::BAD_REQUEST,
            Json(VerifyResponse {
                success: false,
                dev_mode: None,
                error: Some("Verification failed".to_string()),
            }),
        ),
        Err(AppError::VerifierUnavailable(e)) => {
            tracing::warn!(error = %e, "Turnstile siteverify unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(VerifyResponse {
                    success: false,
                    dev_mode: None,
                    error: Some("Verification service unavailable".to_string()),
                }),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Turnstile verification error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(VerifyResponse {
                    success: false,
                    dev_mode: None,
                    error: Some("Server configuration error".to_string()),
                }),
            )
        }
    }
}
