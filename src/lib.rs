// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! PostPilot customer web application backend.
//!
//! Serves the HTTP surface consumed by the PostPilot web frontend:
//! OAuth start/callback, Stripe checkout and subscription management,
//! Turnstile verification, and the aggregated user-data endpoint.
//! The `client` module holds the headless session/entitlement state
//! container the frontend shell drives.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::RestDb;
use services::{AuthApi, BillingApi, TurnstileVerifier};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub auth: AuthApi,
    pub db: RestDb,
    pub billing: BillingApi,
    pub turnstile: TurnstileVerifier,
}
