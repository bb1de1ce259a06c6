// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Stripe API client for checkout and subscription lifecycle.
//!
//! Handles:
//! - Checkout session creation (with the 7-day trial variant)
//! - Cancel / reactivate via `cancel_at_period_end`
//! - Subscription retrieval for reconciliation sync
//!
//! Webhook truth lives at the processor; this client only creates sessions
//! and reconciles single subscriptions on demand.

use crate::error::AppError;
use crate::models::{Subscription, SubscriptionStatus};
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;

const TRIAL_PERIOD_DAYS: u32 = 7;

/// Stripe API client.
#[derive(Clone)]
pub struct BillingApi {
    http: Option<reqwest::Client>,
    base_url: String,
    secret_key: String,
    price_id: String,
    app_url: String,
}

/// Hosted checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Subscription object as the processor returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorSubscription {
    pub id: String,
    pub status: SubscriptionStatus,
    pub customer: String,
    pub cancel_at_period_end: bool,
    /// Unix seconds
    pub current_period_end: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProcessorSubscription {
    /// Map into the local subscription row. The processor's subscription id
    /// doubles as the row id so reconciliation upserts merge.
    pub fn into_row(self) -> Result<Subscription, AppError> {
        let user_id = self
            .metadata
            .get("user_id")
            .cloned()
            .ok_or_else(|| AppError::BillingApi("Subscription missing user_id metadata".into()))?;

        let current_period_end = Utc
            .timestamp_opt(self.current_period_end, 0)
            .single()
            .ok_or_else(|| AppError::BillingApi("Invalid current_period_end".into()))?;

        Ok(Subscription {
            id: self.id.clone(),
            user_id,
            status: self.status,
            stripe_customer_id: self.customer,
            stripe_subscription_id: self.id,
            cancel_at_period_end: self.cancel_at_period_end,
            current_period_end,
            created_at: None,
            updated_at: Some(Utc::now()),
        })
    }
}

impl BillingApi {
    /// Create a new Stripe client.
    pub fn new(secret_key: String, price_id: String, app_url: String) -> Self {
        Self {
            http: Some(reqwest::Client::new()),
            base_url: "https://api.stripe.com/v1".to_string(),
            secret_key,
            price_id,
            app_url,
        }
    }

    /// Point the client at a different API origin (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = format!("{}/v1", base_url.trim_end_matches('/'));
        self
    }

    /// Create a mock client for testing (offline mode).
    pub fn new_mock() -> Self {
        Self {
            http: None,
            base_url: "http://stripe.invalid/v1".to_string(),
            secret_key: "sk_offline".to_string(),
            price_id: "price_offline".to_string(),
            app_url: "http://localhost:3000".to_string(),
        }
    }

    fn get_client(&self) -> Result<&reqwest::Client, AppError> {
        self.http
            .as_ref()
            .ok_or_else(|| AppError::BillingApi("Stripe not connected (offline mode)".to_string()))
    }

    /// Create a hosted checkout session for the Pro plan.
    ///
    /// Trial checkouts add a trial period that cancels itself when no
    /// payment method was collected, and land back on the dashboard rather
    /// than the settings page.
    pub async fn create_checkout_session(
        &self,
        user_id: &str,
        email: &str,
        is_trial: bool,
    ) -> Result<CheckoutSession, AppError> {
        let url = format!("{}/checkout/sessions", self.base_url);

        let success_url = if is_trial {
            format!("{}/dashboard?trial=started", self.app_url)
        } else {
            format!(
                "{}/dashboard/settings?payment=success&tab=subscription",
                self.app_url
            )
        };
        let cancel_url = if is_trial {
            format!("{}/dashboard?trial=canceled", self.app_url)
        } else {
            format!("{}/checkout?canceled=true", self.app_url)
        };

        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "subscription".into()),
            ("payment_method_types[0]".into(), "card".into()),
            ("line_items[0][price]".into(), self.price_id.clone()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("customer_email".into(), email.to_string()),
            ("client_reference_id".into(), user_id.to_string()),
            ("metadata[user_id]".into(), user_id.to_string()),
            (
                "metadata[is_trial]".into(),
                if is_trial { "true" } else { "false" }.into(),
            ),
            ("payment_method_collection".into(), "always".into()),
            (
                "subscription_data[metadata][user_id]".into(),
                user_id.to_string(),
            ),
            ("success_url".into(), success_url),
            ("cancel_url".into(), cancel_url),
        ];

        if is_trial {
            form.push((
                "subscription_data[trial_period_days]".into(),
                TRIAL_PERIOD_DAYS.to_string(),
            ));
            form.push((
                "subscription_data[trial_settings][end_behavior][missing_payment_method]".into(),
                "cancel".into(),
            ));
        }

        let response = self
            .get_client()?
            .post(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::BillingApi(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Flip `cancel_at_period_end` on a subscription.
    pub async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> Result<ProcessorSubscription, AppError> {
        let url = format!("{}/subscriptions/{}", self.base_url, subscription_id);
        let response = self
            .get_client()?
            .post(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[(
                "cancel_at_period_end",
                if cancel { "true" } else { "false" },
            )])
            .send()
            .await
            .map_err(|e| AppError::BillingApi(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Retrieve a subscription for reconciliation.
    pub async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProcessorSubscription, AppError> {
        let url = format!("{}/subscriptions/{}", self.base_url, subscription_id);
        let response = self
            .get_client()?
            .get(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::BillingApi(e.to_string()))?;

        Self::check_response_json(response).await
    }

    // ─── Response handling ───────────────────────────────────────

    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            #[derive(Deserialize)]
            struct StripeError {
                error: StripeErrorBody,
            }
            #[derive(Deserialize)]
            struct StripeErrorBody {
                message: Option<String>,
            }

            let message = serde_json::from_str::<StripeError>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

            return Err(AppError::BillingApi(message));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::BillingApi(format!("Invalid response body: {}", e)))
    }
}
