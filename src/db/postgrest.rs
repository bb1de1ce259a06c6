// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! PostgREST client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - The aggregated `get_user_data` procedure
//! - Profile sync after authentication
//! - Soft-delete flags on the `users` row
//! - Subscription reconciliation rows
//!
//! Row-level security applies: user-scoped calls pass the caller's access
//! token as the bearer, server-side reconciliation passes the service-role
//! key.

use crate::db::tables;
use crate::error::AppError;
use crate::models::user::UserFlags;
use crate::models::{PlanStatus, Profile, Subscription};
use serde::{Deserialize, Serialize};

/// PostgREST data API client.
#[derive(Clone)]
pub struct RestDb {
    http: Option<reqwest::Client>,
    base_url: String,
    api_key: String,
}

/// Result of the aggregated `get_user_data` procedure.
///
/// The procedure precomputes the plan status server-side; the JSON keys for
/// the derived fields are camelCase for the web frontend's benefit.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserDataBundle {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub subscription: Option<Subscription>,
    #[serde(default, rename = "planStatus")]
    pub plan_status: Option<PlanStatus>,
    #[serde(default, rename = "isSubscriber")]
    pub is_subscriber: bool,
}

/// Parameters for the `sync_user_on_signup` procedure.
#[derive(Debug, Clone, Serialize)]
pub struct SyncUserParams {
    pub p_user_id: String,
    pub p_email: Option<String>,
    pub p_full_name: Option<String>,
    pub p_avatar_url: Option<String>,
    pub p_timezone: Option<String>,
    /// Uppercased provider ("EMAIL", "GOOGLE")
    pub p_login_type: String,
    pub p_stripe_customer_id: Option<String>,
}

impl RestDb {
    /// Create a new data API client against `{base_url}/rest/v1`.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: Some(reqwest::Client::new()),
            base_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    /// Create a mock client for testing (offline mode).
    ///
    /// All operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            http: None,
            base_url: "http://db.invalid/rest/v1".to_string(),
            api_key: "offline".to_string(),
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&reqwest::Client, AppError> {
        self.http
            .as_ref()
            .ok_or_else(|| AppError::Database("Data API not connected (offline mode)".to_string()))
    }

    // ─── Aggregated user data ────────────────────────────────────

    /// Fetch profile + subscription + derived plan status in one call.
    pub async fn get_user_data(&self, bearer: &str) -> Result<UserDataBundle, AppError> {
        let url = format!("{}/rpc/{}", self.base_url, tables::RPC_GET_USER_DATA);
        let response = self
            .get_client()?
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::check_response_json(response).await
    }

    // ─── Profile sync ────────────────────────────────────────────

    /// Upsert the profile row after a successful authentication.
    pub async fn sync_user(&self, bearer: &str, params: &SyncUserParams) -> Result<(), AppError> {
        let url = format!("{}/rpc/{}", self.base_url, tables::RPC_SYNC_USER);
        let response = self
            .get_client()?
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .json(params)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::check_response(response).await
    }

    // ─── Soft-delete flags ───────────────────────────────────────

    /// Get the soft-delete flags for a user, if the row exists.
    pub async fn get_user_flags(
        &self,
        bearer: &str,
        user_id: &str,
    ) -> Result<Option<UserFlags>, AppError> {
        let url = format!(
            "{}/{}?id=eq.{}&select=is_deleted,deleted_at",
            self.base_url,
            tables::USERS,
            urlencoding::encode(user_id)
        );
        let response = self
            .get_client()?
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let rows: Vec<UserFlags> = Self::check_response_json(response).await?;
        Ok(rows.into_iter().next())
    }

    /// Clear the soft-delete flags and stamp the reactivation time.
    pub async fn reactivate_user(&self, bearer: &str, user_id: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/{}?id=eq.{}",
            self.base_url,
            tables::USERS,
            urlencoding::encode(user_id)
        );
        let body = serde_json::json!({
            "is_deleted": false,
            "deleted_at": null,
            "reactivated_at": chrono::Utc::now(),
        });
        let response = self
            .get_client()?
            .patch(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::check_response(response).await
    }

    /// Mark a user soft-deleted (service role).
    pub async fn soft_delete_user(&self, bearer: &str, user_id: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/{}?id=eq.{}",
            self.base_url,
            tables::USERS,
            urlencoding::encode(user_id)
        );
        let body = serde_json::json!({
            "is_deleted": true,
            "deleted_at": chrono::Utc::now(),
        });
        let response = self
            .get_client()?
            .patch(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::check_response(response).await
    }

    // ─── Onboarding ──────────────────────────────────────────────

    /// Whether the user has completed the onboarding wizard.
    pub async fn get_onboarding_completed(
        &self,
        bearer: &str,
        user_id: &str,
    ) -> Result<Option<bool>, AppError> {
        #[derive(Deserialize)]
        struct Row {
            has_completed_onboarding: Option<bool>,
        }

        let url = format!(
            "{}/{}?user_id=eq.{}&select=has_completed_onboarding",
            self.base_url,
            tables::USER_PROFILES,
            urlencoding::encode(user_id)
        );
        let response = self
            .get_client()?
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let rows: Vec<Row> = Self::check_response_json(response).await?;
        Ok(rows.into_iter().next().map(|r| r.has_completed_onboarding.unwrap_or(false)))
    }

    // ─── Subscription reconciliation ─────────────────────────────

    /// Upsert a subscription row from a processor snapshot (service role).
    pub async fn upsert_subscription(
        &self,
        bearer: &str,
        subscription: &Subscription,
    ) -> Result<(), AppError> {
        let url = format!("{}/{}", self.base_url, tables::SUBSCRIPTIONS);
        let response = self
            .get_client()?
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Prefer", "resolution=merge-duplicates")
            .bearer_auth(bearer)
            .json(subscription)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Self::check_response(response).await
    }

    // ─── Response handling ───────────────────────────────────────

    async fn check_response(response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Database(format!("HTTP {}: {}", status, body)))
    }

    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Database(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Database(format!("Invalid response body: {}", e)))
    }
}
