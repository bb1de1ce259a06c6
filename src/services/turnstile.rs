// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Turnstile server-side token verification.
//!
//! Sign-in and sign-up forms embed the challenge widget; the resulting
//! token is verified here before a credentialed sign-in is honored.
//! Development mode bypasses verification entirely.

use crate::error::AppError;
use serde::Deserialize;
use std::time::Duration;

const SITEVERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Turnstile verification client.
#[derive(Clone)]
pub struct TurnstileVerifier {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    dev_mode: bool,
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
}

impl TurnstileVerifier {
    pub fn new(secret_key: String, dev_mode: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://challenges.cloudflare.com/turnstile/v0".to_string(),
            secret_key,
            dev_mode,
        }
    }

    /// Point the verifier at a different origin (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = format!("{}/turnstile/v0", base_url.trim_end_matches('/'));
        self
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    /// Verify a challenge token. `Ok(false)` means the challenge failed;
    /// transport problems surface as errors so callers can 503.
    pub async fn verify(&self, token: &str) -> Result<bool, AppError> {
        if self.dev_mode {
            tracing::debug!("Development mode - skipping Turnstile verification");
            return Ok(true);
        }

        if self.secret_key.is_empty() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "TURNSTILE_SECRET_KEY is not set"
            )));
        }

        let url = format!("{}/siteverify", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(SITEVERIFY_TIMEOUT)
            .form(&[("secret", self.secret_key.as_str()), ("response", token)])
            .send()
            .await
            .map_err(|e| AppError::VerifierUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::VerifierUnavailable(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body: SiteVerifyResponse = response
            .json()
            .await
            .map_err(|e| AppError::VerifierUnavailable(e.to_string()))?;

        Ok(body.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dev_mode_bypasses_verification() {
        let verifier = TurnstileVerifier::new(String::new(), true);
        assert!(verifier.verify("anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_secret_is_a_config_error() {
        let verifier = TurnstileVerifier::new(String::new(), false);
        let err = verifier.verify("token").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
