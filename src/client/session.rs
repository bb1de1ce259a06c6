// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Session store: current identity/session pair, kept live via the auth
//! event feed and persisted in a cookie between visits.

use crate::client::events::AuthEvent;
use crate::client::storage::CookieStore;
use crate::models::{Identity, Session};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cookie holding the persisted session between visits.
pub const SESSION_COOKIE: &str = "pp-auth-token";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSession {
    user: Identity,
    session: Session,
}

/// Holds the current identity/session pair for one browser context.
pub struct SessionStore {
    cookies: Arc<CookieStore>,
    state: RwLock<Option<(Identity, Session)>>,
    /// Events arriving after teardown are no-ops.
    mounted: AtomicBool,
}

impl SessionStore {
    pub fn new(cookies: Arc<CookieStore>) -> Self {
        Self {
            cookies,
            state: RwLock::new(None),
            mounted: AtomicBool::new(false),
        }
    }

    /// Read any persisted session and mark the store live.
    ///
    /// An unreadable or expired persisted session is not an error: it is
    /// the normal logged-out terminal state.
    pub async fn initialize(&self) -> Option<Identity> {
        self.mounted.store(true, Ordering::SeqCst);

        let persisted = self
            .cookies
            .get(SESSION_COOKIE)
            .and_then(|raw| serde_json::from_str::<PersistedSession>(&raw).ok());

        let Some(persisted) = persisted else {
            return None;
        };

        if persisted.session.is_expired(chrono::Utc::now()) {
            tracing::debug!("Persisted session expired, starting logged out");
            self.cookies.delete(SESSION_COOKIE);
            return None;
        }

        let identity = persisted.user.clone();
        *self.state.write().await = Some((persisted.user, persisted.session));
        Some(identity)
    }

    /// Current identity/session pair, if signed in.
    pub async fn current(&self) -> Option<(Identity, Session)> {
        self.state.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|(_, session)| session.access_token.clone())
    }

    /// Install a session (sign-in, sign-up) and persist it.
    pub async fn set(&self, user: Identity, session: Session) {
        self.persist(&user, &session);
        *self.state.write().await = Some((user, session));
    }

    /// Drop the session and its persisted cookie.
    pub async fn clear(&self) {
        self.cookies.delete_everywhere(SESSION_COOKIE);
        *self.state.write().await = None;
    }

    /// Apply an external auth-state transition.
    ///
    /// Returns the identity now current, or `None` after sign-out or when
    /// the store has been torn down.
    pub async fn apply_event(&self, event: &AuthEvent) -> Option<Identity> {
        if !self.mounted.load(Ordering::SeqCst) {
            return None;
        }

        match event {
            AuthEvent::SignedIn { user, session } => {
                self.set(user.clone(), session.clone()).await;
                Some(user.clone())
            }
            AuthEvent::TokenRefreshed { session } => {
                let user = {
                    let mut state = self.state.write().await;
                    match state.as_mut() {
                        Some((user, current)) => {
                            *current = session.clone();
                            Some(user.clone())
                        }
                        // Refresh without a session: still logged out.
                        None => None,
                    }
                };
                if let Some(user) = &user {
                    // Re-persist under the refreshed expiry.
                    self.persist(user, session);
                }
                user
            }
            AuthEvent::SignedOut => {
                self.clear().await;
                None
            }
        }
    }

    /// Tear down: subsequent events are ignored.
    pub fn dispose(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn persist(&self, user: &Identity, session: &Session) {
        let persisted = PersistedSession {
            user: user.clone(),
            session: session.clone(),
        };
        match serde_json::to_string(&persisted) {
            Ok(json) => self.cookies.set(SESSION_COOKIE, &json),
            Err(e) => tracing::warn!(error = %e, "Could not persist session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            email: Some(format!("{id}@example.com")),
            provider: Some("email".to_string()),
            email_confirmed_at: None,
            created_at: None,
        }
    }

    fn live_session() -> Session {
        Session {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_at: Utc::now().timestamp() + 3600,
        }
    }

    #[tokio::test]
    async fn test_initialize_without_cookie_is_logged_out() {
        let store = SessionStore::new(CookieStore::new());
        assert_eq!(store.initialize().await.map(|u| u.id), None);
        assert!(store.current().await.is_none());
    }

    #[tokio::test]
    async fn test_initialize_restores_persisted_session() {
        let cookies = CookieStore::new();
        let store = SessionStore::new(cookies.clone());
        store.set(identity("user-1"), live_session()).await;

        // A fresh store over the same cookies sees the session.
        let revisit = SessionStore::new(cookies);
        let user = revisit.initialize().await;
        assert_eq!(user.map(|u| u.id).as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_initialize_drops_expired_session() {
        let cookies = CookieStore::new();
        let store = SessionStore::new(cookies.clone());
        let expired = Session {
            expires_at: Utc::now().timestamp() - 60,
            ..live_session()
        };
        store.set(identity("user-1"), expired).await;

        let revisit = SessionStore::new(cookies.clone());
        assert!(revisit.initialize().await.is_none());
        // The stale cookie is gone too.
        assert!(cookies.get(SESSION_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_initialize_tolerates_garbage_cookie() {
        let cookies = CookieStore::new();
        cookies.set(SESSION_COOKIE, "not json at all");

        let store = SessionStore::new(cookies);
        assert!(store.initialize().await.is_none());
    }

    #[tokio::test]
    async fn test_events_after_dispose_are_noops() {
        let store = SessionStore::new(CookieStore::new());
        store.initialize().await;
        store.dispose();

        let result = store
            .apply_event(&AuthEvent::SignedIn {
                user: identity("user-1"),
                session: live_session(),
            })
            .await;

        assert!(result.is_none());
        assert!(store.current().await.is_none());
    }

    #[tokio::test]
    async fn test_signed_out_event_clears_state_and_cookie() {
        let cookies = CookieStore::new();
        let store = SessionStore::new(cookies.clone());
        store.initialize().await;
        store.set(identity("user-1"), live_session()).await;

        store.apply_event(&AuthEvent::SignedOut).await;

        assert!(store.current().await.is_none());
        assert!(cookies.get(SESSION_COOKIE).is_none());
    }
}
