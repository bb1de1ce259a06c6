// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! API routes for authenticated users.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{AccessStatus, PlanStatus, Profile, Subscription};
use crate::AppState;
use axum::{
    extract::State,
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/account", delete(delete_account))
}

// ─── Aggregated user data ────────────────────────────────────

/// Current user response: profile, subscription and derived entitlement
/// in one round trip.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub profile: Option<Profile>,
    pub subscription: Option<Subscription>,
    #[serde(rename = "planStatus")]
    pub plan_status: PlanStatus,
    #[serde(rename = "isSubscriber")]
    pub is_subscriber: bool,
    pub access: AccessStatus,
}

/// Get the caller's aggregated data. Row-level security applies through
/// the forwarded access token.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let bundle = state.db.get_user_data(&user.access_token).await?;

    let access = AccessStatus::evaluate(
        bundle.subscription.as_ref(),
        bundle.is_subscriber,
        chrono::Utc::now(),
    );

    Ok(Json(MeResponse {
        user_id: user.user_id,
        email: user.email,
        profile: bundle.profile,
        subscription: bundle.subscription,
        plan_status: bundle.plan_status.unwrap_or(PlanStatus::Free),
        is_subscriber: bundle.is_subscriber,
        access,
    }))
}

// ─── Account deletion ────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub message: String,
}

/// Delete the caller's account.
///
/// The row is soft-deleted first so a failed backend deletion leaves the
/// account recoverable by signing in again.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    tracing::info!(user_id = %user.user_id, "User-initiated account deletion");

    state
        .db
        .soft_delete_user(&state.config.auth_service_key, &user.user_id)
        .await?;

    state
        .auth
        .admin_delete_user(&state.config.auth_service_key, &user.user_id)
        .await?;

    Ok(Json(DeleteAccountResponse {
        success: true,
        message: "Account deleted".to_string(),
    }))
}
