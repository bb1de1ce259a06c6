// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Profile/entitlement fetcher.
//!
//! One aggregated call returns profile, subscription and the precomputed
//! plan status. Any failure degrades to the least-privileged snapshot
//! instead of blocking the UI: entitlement-fetch errors are never surfaced.

use crate::db::RestDb;
use crate::models::{PlanStatus, Profile, Subscription};

/// Snapshot of everything the dashboard needs about the signed-in user.
#[derive(Debug, Clone, Default)]
pub struct UserSnapshot {
    pub profile: Option<Profile>,
    pub subscription: Option<Subscription>,
    pub plan_status: PlanStatus,
    pub is_subscriber: bool,
}

impl UserSnapshot {
    /// The "no entitlement" default: free tier, nothing loaded.
    pub fn no_entitlement() -> Self {
        Self {
            profile: None,
            subscription: None,
            plan_status: PlanStatus::Free,
            is_subscriber: false,
        }
    }
}

/// Fetches the aggregated user data, failing open to the free tier.
#[derive(Clone)]
pub struct EntitlementFetcher {
    db: RestDb,
}

impl EntitlementFetcher {
    pub fn new(db: RestDb) -> Self {
        Self { db }
    }

    /// Fetch the snapshot for the caller behind `access_token`.
    ///
    /// Never errors: network, permission and missing-record failures all
    /// resolve to [`UserSnapshot::no_entitlement`] and a log line. Safe to
    /// call repeatedly (manual refresh from settings).
    pub async fn fetch(&self, access_token: &str) -> UserSnapshot {
        match self.db.get_user_data(access_token).await {
            Ok(bundle) => UserSnapshot {
                profile: bundle.profile,
                subscription: bundle.subscription,
                plan_status: bundle.plan_status.unwrap_or(PlanStatus::Free),
                is_subscriber: bundle.is_subscriber,
            },
            Err(e) => {
                tracing::warn!(error = %e, "User data fetch failed, downgrading to free tier");
                UserSnapshot::no_entitlement()
            }
        }
    }
}
