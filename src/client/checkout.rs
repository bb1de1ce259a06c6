// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Checkout orchestrator.
//!
//! Per user action ("start trial" / "subscribe") one of three outcomes
//! applies: no session goes to registration, an existing entitlement goes
//! to the dashboard, otherwise a checkout session is created and the
//! browser does a full-page redirect to the hosted checkout. A broken
//! checkout never strands the user: failures fall back to the dashboard.

use crate::client::context::AuthState;
use crate::client::Navigation;
use crate::models::AccessStatus;
use serde::Deserialize;

/// Drives the checkout decision against this app's own backend.
pub struct CheckoutFlow {
    http: reqwest::Client,
    backend_url: String,
}

#[derive(Deserialize)]
struct CheckoutResponse {
    url: String,
}

#[derive(Deserialize)]
struct CheckoutError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl CheckoutFlow {
    pub fn new(backend_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            backend_url: backend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Decide and perform the checkout navigation.
    pub async fn start(&self, state: &AuthState, access: &AccessStatus, trial: bool) -> Navigation {
        let Some(user) = &state.user else {
            tracing::info!("No session, sending visitor to registration");
            return Navigation::Assign("/register".to_string());
        };

        if access.has_access || state.subscription.is_some() {
            tracing::info!(
                reason = ?access.reason,
                "Entitlement already present, sending to dashboard"
            );
            return Navigation::Assign("/dashboard".to_string());
        }

        let email = user.email.clone().unwrap_or_default();
        let token = state.session.as_ref().map(|s| s.access_token.clone());

        match self.create_session(&user.id, &email, token.as_deref(), trial).await {
            Ok(url) => {
                tracing::info!("Checkout session created, redirecting to hosted checkout");
                Navigation::Assign(url)
            }
            Err(e) => {
                // Safe fallback: never leave the user on a broken checkout.
                tracing::error!(error = %e, "Checkout session creation failed");
                Navigation::Assign("/dashboard".to_string())
            }
        }
    }

    async fn create_session(
        &self,
        user_id: &str,
        email: &str,
        access_token: Option<&str>,
        trial: bool,
    ) -> Result<String, String> {
        let url = format!("{}/api/stripe/create-checkout", self.backend_url);

        let mut request = self.http.post(&url).json(&serde_json::json!({
            "userId": user_id,
            "email": email,
            "isTrialCheckout": trial,
        }));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<CheckoutError>()
                .await
                .ok()
                .and_then(|e| e.details.or(e.error))
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(message);
        }

        let body: CheckoutResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(body.url)
    }
}
