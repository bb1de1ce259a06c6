// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Derived access status.
//!
//! Pure mapping from a subscription record to entitlement flags. Recomputed
//! on every subscription change; never cached beyond the current in-memory
//! snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::subscription::{PlanStatus, Subscription, SubscriptionStatus};

/// Why access is (or is not) granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum AccessReason {
    Trial,
    Subscription,
    None,
}

/// Entitlement flags derived from the current subscription snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AccessStatus {
    pub has_access: bool,
    pub reason: AccessReason,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub plan_status: PlanStatus,
}

impl AccessStatus {
    /// The logged-out / no-entitlement default.
    pub fn denied() -> Self {
        Self {
            has_access: false,
            reason: AccessReason::None,
            trial_ends_at: None,
            subscription_ends_at: None,
            plan_status: PlanStatus::Free,
        }
    }

    /// Evaluate entitlement at `now`.
    ///
    /// Access is granted iff a subscription exists, the identity is a
    /// subscriber, and `current_period_end` is strictly in the future.
    pub fn evaluate(
        subscription: Option<&Subscription>,
        is_subscriber: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(sub) = subscription else {
            return Self::denied();
        };

        if !is_subscriber || sub.current_period_end <= now {
            return Self::denied();
        }

        if sub.status == SubscriptionStatus::Trialing {
            Self {
                has_access: true,
                reason: AccessReason::Trial,
                trial_ends_at: Some(sub.current_period_end),
                subscription_ends_at: None,
                plan_status: PlanStatus::Trial,
            }
        } else {
            Self {
                has_access: true,
                reason: AccessReason::Subscription,
                trial_ends_at: None,
                subscription_ends_at: Some(sub.current_period_end),
                plan_status: PlanStatus::Pro,
            }
        }
    }
}
