// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Services module - external collaborator clients.

pub mod auth_api;
pub mod billing;
pub mod turnstile;

pub use auth_api::{AuthApi, AuthTokens, BackendUser, SignUpOutcome};
pub use billing::{BillingApi, CheckoutSession};
pub use turnstile::TurnstileVerifier;
