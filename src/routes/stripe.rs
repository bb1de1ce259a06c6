// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Stripe checkout and subscription management routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Subscription;
use crate::AppState;
use axum::{
    extract::State,
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Stripe routes (require authentication).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stripe/create-checkout", post(create_checkout))
        .route("/api/stripe/cancel", post(cancel_subscription))
        .route("/api/stripe/reactivate", post(reactivate_subscription))
        .route("/api/stripe/sync", post(sync_subscription))
}

// ─── Checkout ────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub is_trial_checkout: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckoutResponse {
    pub url: String,
}

/// Create a hosted checkout session for the caller.
async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateCheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // The checkout must belong to the session that requested it.
    if payload.user_id != user.user_id {
        return Err(AppError::Forbidden(
            "user_id does not match the authenticated session".to_string(),
        ));
    }

    tracing::info!(
        user_id = %payload.user_id,
        trial = payload.is_trial_checkout,
        "Creating checkout session"
    );

    let session = state
        .billing
        .create_checkout_session(&payload.user_id, &payload.email, payload.is_trial_checkout)
        .await?;

    tracing::info!(session_id = %session.id, "Checkout session created");

    Ok(Json(CheckoutResponse { url: session.url }))
}

// ─── Subscription lifecycle ──────────────────────────────────

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    #[validate(length(min = 1))]
    pub subscription_id: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubscriptionResponse {
    pub subscription: Subscription,
}

/// Schedule cancellation at period end.
async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let processor = state
        .billing
        .set_cancel_at_period_end(&payload.subscription_id, true)
        .await?;

    let row = reconcile(&state, &user, processor).await?;
    tracing::info!(subscription_id = %row.stripe_subscription_id, "Subscription set to cancel");

    Ok(Json(SubscriptionResponse { subscription: row }))
}

/// Undo a scheduled cancellation.
async fn reactivate_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let processor = state
        .billing
        .set_cancel_at_period_end(&payload.subscription_id, false)
        .await?;

    let row = reconcile(&state, &user, processor).await?;
    tracing::info!(subscription_id = %row.stripe_subscription_id, "Subscription reactivated");

    Ok(Json(SubscriptionResponse { subscription: row }))
}

/// Reconcile one subscription from the processor into the data API.
///
/// Webhooks are the usual source of truth; this endpoint exists for the
/// settings page to force a refresh when a webhook was missed.
async fn sync_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let processor = state
        .billing
        .retrieve_subscription(&payload.subscription_id)
        .await?;

    let row = reconcile(&state, &user, processor).await?;
    tracing::info!(subscription_id = %row.stripe_subscription_id, "Subscription synced");

    Ok(Json(SubscriptionResponse { subscription: row }))
}

/// Map a processor snapshot to a row, check ownership, upsert with the
/// service role.
async fn reconcile(
    state: &Arc<AppState>,
    user: &AuthUser,
    processor: crate::services::billing::ProcessorSubscription,
) -> Result<Subscription> {
    let row = processor.into_row()?;

    if row.user_id != user.user_id {
        return Err(AppError::Forbidden(
            "subscription does not belong to the authenticated user".to_string(),
        ));
    }

    state
        .db
        .upsert_subscription(&state.config.auth_service_key, &row)
        .await?;

    Ok(row)
}
