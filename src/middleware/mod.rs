// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Middleware modules (authentication, security headers).

pub mod auth;
pub mod security;

pub use auth::require_auth;
