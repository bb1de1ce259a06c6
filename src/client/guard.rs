// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Route guard for protected views.
//!
//! State machine: `loading -> (authenticated | unauthenticated)`. Loading
//! never redirects; a sign-out in progress never redirects (the logout
//! owns its navigation); otherwise unauthenticated visits to non-public
//! paths bounce to the login view carrying the original path.

use crate::client::context::AuthState;
use crate::client::storage::{LocalStorage, LOGGING_OUT_KEY};
use crate::client::Navigation;
use std::sync::Arc;

/// Routes reachable without a session.
pub const PUBLIC_ROUTES: &[&str] = &[
    "/",
    "/login",
    "/register",
    "/verify-email",
    "/reset-password",
    "/update-password",
    "/auth/callback",
    "/checkout",
];

/// What the shell should render for the current route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth state unresolved: show the loading placeholder, do not redirect.
    Placeholder,
    /// Render the requested view.
    Render,
    /// Hard redirect to the login view.
    Redirect(String),
}

pub struct RouteGuard {
    storage: Arc<LocalStorage>,
}

impl RouteGuard {
    pub fn new(storage: Arc<LocalStorage>) -> Self {
        Self { storage }
    }

    pub fn is_public(path: &str) -> bool {
        PUBLIC_ROUTES.contains(&path)
    }

    /// Decide what to do with the current route.
    pub fn decide(&self, state: &AuthState, path: &str) -> GuardDecision {
        if state.is_loading {
            return GuardDecision::Placeholder;
        }

        if Self::is_public(path) || state.user.is_some() {
            return GuardDecision::Render;
        }

        // A logout in progress owns the navigation; don't race it.
        if self.storage.get(LOGGING_OUT_KEY).as_deref() == Some("true") {
            return GuardDecision::Placeholder;
        }

        GuardDecision::Redirect(format!("/login?redirect={}", urlencoding::encode(path)))
    }

    /// Turn a decision into the navigation the shell performs.
    pub fn navigation(decision: &GuardDecision) -> Navigation {
        match decision {
            GuardDecision::Redirect(target) => Navigation::Assign(target.clone()),
            _ => Navigation::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Identity, PlanStatus};

    fn state(is_loading: bool, signed_in: bool) -> AuthState {
        AuthState {
            user: signed_in.then(|| Identity {
                id: "user-1".to_string(),
                email: Some("a@b.c".to_string()),
                provider: None,
                email_confirmed_at: None,
                created_at: None,
            }),
            session: None,
            profile: None,
            subscription: None,
            plan_status: if is_loading {
                PlanStatus::Loading
            } else {
                PlanStatus::Free
            },
            is_subscriber: false,
            is_loading,
        }
    }

    fn guard() -> (RouteGuard, Arc<LocalStorage>) {
        let storage = LocalStorage::new();
        (RouteGuard::new(storage.clone()), storage)
    }

    #[test]
    fn test_loading_never_redirects() {
        let (guard, _) = guard();
        let decision = guard.decide(&state(true, false), "/dashboard/settings");
        assert_eq!(decision, GuardDecision::Placeholder);
    }

    #[test]
    fn test_unauthenticated_protected_path_redirects_with_return_target() {
        let (guard, _) = guard();
        let decision = guard.decide(&state(false, false), "/dashboard/settings");
        assert_eq!(
            decision,
            GuardDecision::Redirect("/login?redirect=%2Fdashboard%2Fsettings".to_string())
        );
        assert_eq!(
            RouteGuard::navigation(&decision),
            Navigation::Assign("/login?redirect=%2Fdashboard%2Fsettings".to_string())
        );
    }

    #[test]
    fn test_unauthenticated_public_path_renders() {
        let (guard, _) = guard();
        for path in ["/", "/login", "/register", "/checkout"] {
            assert_eq!(guard.decide(&state(false, false), path), GuardDecision::Render);
        }
    }

    #[test]
    fn test_authenticated_renders_everywhere() {
        let (guard, _) = guard();
        assert_eq!(
            guard.decide(&state(false, true), "/dashboard/settings"),
            GuardDecision::Render
        );
    }

    #[test]
    fn test_logout_marker_suppresses_redirect() {
        let (guard, storage) = guard();
        storage.set(LOGGING_OUT_KEY, "true");

        let decision = guard.decide(&state(false, false), "/dashboard");
        assert_eq!(decision, GuardDecision::Placeholder);
    }
}
