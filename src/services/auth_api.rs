// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Managed auth backend client (GoTrue-style REST surface).
//!
//! Handles:
//! - Password sign-in and sign-up
//! - OAuth authorize-URL construction and code exchange
//! - Session revocation
//! - Password/email updates and recovery email dispatch
//! - Admin user deletion (service role)
//!
//! Backend error messages are surfaced verbatim: the sign-in and sign-up
//! forms display them unchanged.

use crate::error::AppError;
use crate::models::{Identity, Session};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Auth backend client.
#[derive(Clone)]
pub struct AuthApi {
    http: Option<reqwest::Client>,
    base_url: String,
    api_key: String,
}

/// Raw user record as the auth backend returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub app_metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub user_metadata: HashMap<String, serde_json::Value>,
}

impl BackendUser {
    /// Provider that created the account ("email" when absent).
    pub fn provider(&self) -> String {
        self.app_metadata
            .get("provider")
            .and_then(|v| v.as_str())
            .unwrap_or("email")
            .to_string()
    }

    /// Display name from provider metadata, if any.
    pub fn full_name(&self) -> Option<String> {
        self.user_metadata
            .get("full_name")
            .or_else(|| self.user_metadata.get("name"))
            .and_then(|v| v.as_str())
            .map(String::from)
    }

    /// Avatar URL from provider metadata, if any.
    pub fn avatar_url(&self) -> Option<String> {
        self.user_metadata
            .get("avatar_url")
            .or_else(|| self.user_metadata.get("picture"))
            .and_then(|v| v.as_str())
            .map(String::from)
    }

    pub fn to_identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            email: self.email.clone(),
            provider: Some(self.provider()),
            email_confirmed_at: self.email_confirmed_at,
            created_at: self.created_at,
        }
    }
}

/// Token grant response (password grant, code exchange).
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: BackendUser,
}

impl AuthTokens {
    /// Absolute expiry, falling back to now + `expires_in`.
    pub fn session(&self) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + self.expires_in.unwrap_or(3600));
        Session {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at,
        }
    }
}

/// Result of a sign-up call.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// Backend issued a session immediately.
    SignedIn(AuthTokens),
    /// The identity exists but requires email confirmation first.
    ConfirmationRequired(BackendUser),
}

#[derive(Debug, Deserialize)]
struct SignUpResponse {
    // Sign-up with autoconfirm returns the grant fields inline; without it
    // only the user record comes back.
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<BackendUser>,
    // Non-autoconfirm responses are the bare user record.
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    app_metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    user_metadata: HashMap<String, serde_json::Value>,
}

/// Fields accepted by the user-update endpoint.
#[derive(Debug, Default, serde::Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AuthApi {
    /// Create a new client against `{base_url}/auth/v1`.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: Some(reqwest::Client::new()),
            base_url: format!("{}/auth/v1", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    /// Create a mock client for testing (offline mode).
    pub fn new_mock() -> Self {
        Self {
            http: None,
            base_url: "http://auth.invalid/auth/v1".to_string(),
            api_key: "offline".to_string(),
        }
    }

    fn get_client(&self) -> Result<&reqwest::Client, AppError> {
        self.http.as_ref().ok_or_else(|| {
            AppError::AuthApi("Auth backend not connected (offline mode)".to_string())
        })
    }

    /// Build the hosted authorize URL for a redirect-based OAuth sign-in.
    pub fn authorize_url(&self, provider: &str, redirect_to: &str) -> String {
        format!(
            "{}/authorize?provider={}&redirect_to={}&access_type=offline&prompt=consent",
            self.base_url,
            provider,
            urlencoding::encode(redirect_to)
        )
    }

    /// Password grant sign-in.
    pub async fn password_grant(&self, email: &str, password: &str) -> Result<AuthTokens, AppError> {
        let url = format!("{}/token?grant_type=password", self.base_url);
        let response = self
            .get_client()?
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::AuthApi(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Exchange an OAuth authorization code for a session.
    pub async fn exchange_code(&self, code: &str) -> Result<AuthTokens, AppError> {
        let url = format!("{}/token?grant_type=pkce", self.base_url);
        let response = self
            .get_client()?
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "auth_code": code }))
            .send()
            .await
            .map_err(|e| AppError::AuthApi(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Create a new identity. Absent session means the address must be
    /// confirmed before sign-in proceeds.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        email_redirect_to: &str,
    ) -> Result<SignUpOutcome, AppError> {
        let url = format!("{}/signup", self.base_url);
        let response = self
            .get_client()?
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "options": { "email_redirect_to": email_redirect_to },
            }))
            .send()
            .await
            .map_err(|e| AppError::AuthApi(e.to_string()))?;

        let body: SignUpResponse = Self::check_response_json(response).await?;

        match (body.access_token, body.refresh_token, body.user) {
            (Some(access_token), Some(refresh_token), Some(user)) => {
                Ok(SignUpOutcome::SignedIn(AuthTokens {
                    access_token,
                    refresh_token,
                    expires_in: body.expires_in,
                    expires_at: body.expires_at,
                    user,
                }))
            }
            (_, _, user) => {
                let user = user.or_else(|| {
                    body.id.map(|id| BackendUser {
                        id,
                        email: body.email,
                        email_confirmed_at: body.email_confirmed_at,
                        created_at: body.created_at,
                        app_metadata: body.app_metadata,
                        user_metadata: body.user_metadata,
                    })
                });
                match user {
                    Some(user) => Ok(SignUpOutcome::ConfirmationRequired(user)),
                    None => Err(AppError::AuthApi(
                        "Sign-up response contained no user".to_string(),
                    )),
                }
            }
        }
    }

    /// Revoke the session behind `access_token` (global scope).
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let url = format!("{}/logout?scope=global", self.base_url);
        let response = self
            .get_client()?
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::AuthApi(e.to_string()))?;

        Self::check_response(response).await
    }

    /// Update password and/or email for the session's user.
    pub async fn update_user(
        &self,
        access_token: &str,
        update: &UserUpdate,
    ) -> Result<BackendUser, AppError> {
        let url = format!("{}/user", self.base_url);
        let response = self
            .get_client()?
            .put(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .json(update)
            .send()
            .await
            .map_err(|e| AppError::AuthApi(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Dispatch a password-recovery email.
    pub async fn recover(&self, email: &str, redirect_to: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/recover?redirect_to={}",
            self.base_url,
            urlencoding::encode(redirect_to)
        );
        let response = self
            .get_client()?
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(|e| AppError::AuthApi(e.to_string()))?;

        Self::check_response(response).await
    }

    /// Delete an identity outright (service role).
    pub async fn admin_delete_user(
        &self,
        service_key: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/admin/users/{}", self.base_url, user_id);
        let response = self
            .get_client()?
            .delete(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(service_key)
            .send()
            .await
            .map_err(|e| AppError::AuthApi(e.to_string()))?;

        Self::check_response(response).await
    }

    // ─── Response handling ───────────────────────────────────────

    /// Pull the human-readable message out of a backend error body.
    fn error_message(status: reqwest::StatusCode, body: &str) -> String {
        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(default)]
            error_description: Option<String>,
            #[serde(default)]
            msg: Option<String>,
            #[serde(default)]
            error: Option<String>,
        }

        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error_description.or(b.msg).or(b.error))
            .unwrap_or_else(|| format!("HTTP {}: {}", status, body))
    }

    async fn check_response(response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::AuthApi(Self::error_message(status, &body)))
    }

    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::AuthApi(Self::error_message(status, &body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::AuthApi(format!("Invalid response body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_encodes_redirect() {
        let api = AuthApi::new("http://localhost:54321", "anon");
        let url = api.authorize_url("google", "http://localhost:8080/auth/callback");

        assert!(url.starts_with("http://localhost:54321/auth/v1/authorize?provider=google"));
        assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fcallback"));
        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn test_error_message_prefers_description() {
        let msg = AuthApi::error_message(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(msg, "Invalid login credentials");
    }

    #[test]
    fn test_backend_user_metadata_fallbacks() {
        let user: BackendUser = serde_json::from_value(serde_json::json!({
            "id": "user-1",
            "email": "a@b.c",
            "app_metadata": { "provider": "google" },
            "user_metadata": { "name": "Ada", "picture": "https://img/p.png" },
        }))
        .unwrap();

        assert_eq!(user.provider(), "google");
        assert_eq!(user.full_name().as_deref(), Some("Ada"));
        assert_eq!(user.avatar_url().as_deref(), Some("https://img/p.png"));
    }
}
