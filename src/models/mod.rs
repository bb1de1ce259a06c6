// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Data models for the application.

pub mod entitlement;
pub mod subscription;
pub mod user;

pub use entitlement::{AccessReason, AccessStatus};
pub use subscription::{PlanStatus, Subscription, SubscriptionStatus};
pub use user::{Identity, Profile, Session};
