//! Identity, session and profile models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Authenticated identity as issued by the auth backend.
///
/// The id is opaque and immutable for the lifetime of the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Which provider created the account ("email", "google", ...)
    #[serde(default)]
    pub provider: Option<String>,
    /// Set once the address has been confirmed
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Session token pair for one browser context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry of the access token (Unix seconds)
    pub expires_at: i64,
}

impl Session {
    /// Whether the access token has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp()
    }
}

/// Per-identity profile row, owned by exactly one identity.
///
/// Created alongside the identity by the `sync_user_on_signup` procedure
/// and updated through settings. Never deleted independently of the
/// identity; account deletion soft-deletes first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Profile {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// Provider the account signed up with, uppercased ("EMAIL", "GOOGLE")
    #[serde(default)]
    pub login_type: Option<String>,
    #[serde(default)]
    pub has_completed_onboarding: bool,
    /// Free-text feedback left from the dashboard
    #[serde(default)]
    pub feedbacks: Option<String>,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub current_subscription_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Soft-deletion flags on the `users` row.
///
/// A password sign-in on a soft-deleted account reactivates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFlags {
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}
