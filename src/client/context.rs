// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Auth context: the process-wide reactive state container.
//!
//! Composes the session store, the entitlement fetcher and the derived
//! status calculator, and exposes the imperative auth operations. All
//! entitlement re-fetching flows through the event loop, so each identity
//! transition triggers the fetcher exactly once.
//!
//! The in-memory state is the single shared mutable resource, written by
//! the bootstrap, the event loop and manual refreshes. Last writer wins;
//! a stale fetch resolving after a newer one is an accepted race.

use crate::client::events::{AuthEvent, AuthEvents, ChangeFeed};
use crate::client::fetcher::EntitlementFetcher;
use crate::client::session::SessionStore;
use crate::client::storage::{CookieStore, LocalStorage, LOGGING_OUT_KEY};
use crate::client::Navigation;
use crate::db::{RestDb, SyncUserParams};
use crate::error::AppError;
use crate::models::{AccessStatus, Identity, PlanStatus, Profile, Session, Subscription};
use crate::services::auth_api::{AuthApi, BackendUser, SignUpOutcome, UserUpdate};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

/// Client-side configuration, injected at construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of this application's own backend
    pub backend_url: String,
    /// Origin of the web frontend (page URLs in emails, redirects)
    pub app_url: String,
    /// IANA timezone reported by the browser context, if known
    pub timezone: Option<String>,
    /// Budget for the best-effort backend sign-out call
    pub sign_out_timeout: Duration,
}

impl ClientConfig {
    pub fn new(backend_url: &str, app_url: &str) -> Self {
        Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            app_url: app_url.trim_end_matches('/').to_string(),
            timezone: None,
            sign_out_timeout: Duration::from_secs(3),
        }
    }
}

/// Reactive auth state consumed by the UI tree.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub user: Option<Identity>,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub subscription: Option<Subscription>,
    pub plan_status: PlanStatus,
    pub is_subscriber: bool,
    pub is_loading: bool,
}

impl AuthState {
    fn initial() -> Self {
        Self {
            user: None,
            session: None,
            profile: None,
            subscription: None,
            plan_status: PlanStatus::Loading,
            is_subscriber: false,
            is_loading: true,
        }
    }
}

/// Outcome of a sign-up attempt.
#[derive(Debug, Clone)]
pub enum SignUpResult {
    SignedIn(Identity),
    /// The caller should redirect to the verification-pending view.
    ConfirmationRequired,
}

/// Process-wide auth state container with an explicit lifecycle.
pub struct AuthContext {
    config: ClientConfig,
    auth: AuthApi,
    db: RestDb,
    fetcher: EntitlementFetcher,
    session_store: SessionStore,
    cookies: Arc<CookieStore>,
    storage: Arc<LocalStorage>,
    auth_events: AuthEvents,
    change_feed: ChangeFeed,
    state: RwLock<AuthState>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl AuthContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ClientConfig,
        auth: AuthApi,
        db: RestDb,
        cookies: Arc<CookieStore>,
        storage: Arc<LocalStorage>,
        auth_events: AuthEvents,
        change_feed: ChangeFeed,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            auth,
            fetcher: EntitlementFetcher::new(db.clone()),
            db,
            session_store: SessionStore::new(cookies.clone()),
            cookies,
            storage,
            auth_events,
            change_feed,
            state: RwLock::new(AuthState::initial()),
            event_task: Mutex::new(None),
        })
    }

    /// Bootstrap: restore any persisted session, fetch user data if signed
    /// in, then start the event loop.
    pub async fn init(self: &Arc<Self>) {
        self.session_store.initialize().await;

        if let Some((user, session)) = self.session_store.current().await {
            {
                let mut state = self.state.write().await;
                state.user = Some(user);
                state.session = Some(session);
            }
            self.fetch_all_user_data().await;
        }

        {
            let mut state = self.state.write().await;
            state.is_loading = false;
            if state.user.is_none() {
                state.plan_status = PlanStatus::Free;
            }
        }

        let ctx = Arc::downgrade(self);
        let mut auth_rx = self.auth_events.subscribe();
        let mut feed_rx = self.change_feed.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = auth_rx.recv() => match event {
                        Ok(event) => {
                            let Some(ctx) = ctx.upgrade() else { break };
                            ctx.handle_auth_event(event).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "Auth event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    change = feed_rx.recv() => match change {
                        Ok(change) => {
                            let Some(ctx) = ctx.upgrade() else { break };
                            ctx.handle_row_change(change).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "Change feed lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        *self.event_task.lock().unwrap() = Some(handle);
    }

    /// Tear down: subsequent events are dropped, the loop stops.
    pub fn dispose(&self) {
        self.session_store.dispose();
        if let Some(handle) = self.event_task.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Current state snapshot.
    pub async fn snapshot(&self) -> AuthState {
        self.state.read().await.clone()
    }

    /// Entitlement derived from the current snapshot, evaluated now.
    pub async fn access_status(&self) -> AccessStatus {
        let state = self.state.read().await;
        AccessStatus::evaluate(
            state.subscription.as_ref(),
            state.is_subscriber,
            chrono::Utc::now(),
        )
    }

    /// Emitter handle for the auth event feed.
    pub fn auth_events(&self) -> &AuthEvents {
        &self.auth_events
    }

    /// Emitter handle for the row-change push feed.
    pub fn change_feed(&self) -> &ChangeFeed {
        &self.change_feed
    }

    pub fn is_logging_out(&self) -> bool {
        self.storage.get(LOGGING_OUT_KEY).as_deref() == Some("true")
    }

    // ─── Event handling ──────────────────────────────────────────

    async fn handle_auth_event(&self, event: AuthEvent) {
        if !self.session_store.is_mounted() {
            return;
        }

        let logging_out = self.is_logging_out();
        if logging_out && matches!(event, AuthEvent::SignedOut) {
            // The logout flow already tore local state down; don't let the
            // echoed event race its navigation.
            return;
        }

        match self.session_store.apply_event(&event).await {
            Some(user) => {
                let session = self.session_store.current().await.map(|(_, s)| s);
                {
                    let mut state = self.state.write().await;
                    state.user = Some(user);
                    state.session = session;
                }
                self.fetch_all_user_data().await;

                if logging_out {
                    self.storage.remove(LOGGING_OUT_KEY);
                }
            }
            None => {
                let mut state = self.state.write().await;
                state.user = None;
                state.session = None;
                state.profile = None;
                state.subscription = None;
                state.plan_status = PlanStatus::Free;
                state.is_subscriber = false;
            }
        }
    }

    /// Any push scoped to the current user triggers a wholesale re-fetch.
    async fn handle_row_change(&self, change: crate::client::events::RowChange) {
        let current = self.state.read().await.user.as_ref().map(|u| u.id.clone());
        if current.as_deref() == Some(change.user_id.as_str()) {
            tracing::debug!(table = ?change.table, "Row change push, re-fetching user data");
            self.fetch_all_user_data().await;
        }
    }

    /// Run the aggregated fetch and overwrite the snapshot fields.
    async fn fetch_all_user_data(&self) {
        let Some(token) = self.session_store.access_token().await else {
            return;
        };
        let snapshot = self.fetcher.fetch(&token).await;

        let mut state = self.state.write().await;
        state.profile = snapshot.profile;
        state.subscription = snapshot.subscription;
        state.plan_status = snapshot.plan_status;
        state.is_subscriber = snapshot.is_subscriber;
    }

    /// Manual refresh (settings actions, post-checkout return).
    pub async fn refresh_user_data(&self) {
        if self.state.read().await.user.is_some() {
            self.fetch_all_user_data().await;
        }
    }

    // ─── Imperative operations ───────────────────────────────────

    /// Build the OAuth start navigation, carrying forward the
    /// query-parameter intent (the redirect loses router state).
    pub fn sign_in_with_google(
        &self,
        signup: bool,
        payment: bool,
        redirect_to_subscription: bool,
    ) -> Navigation {
        let mut params: Vec<&str> = Vec::new();
        if signup {
            params.push("signup=true");
            if redirect_to_subscription {
                params.push("redirect_to_subscription=true");
            }
        } else if payment {
            params.push("payment=true");
        }

        let mut url = format!("{}/auth/google", self.config.backend_url);
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }
        Navigation::Assign(url)
    }

    /// Password sign-in. Backend errors are re-thrown for the form to
    /// display; the reactivation check and profile sync ride along.
    pub async fn sign_in_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AppError> {
        let tokens = self.auth.password_grant(email, password).await?;
        let identity = tokens.user.to_identity();
        let session = tokens.session();

        // A sign-in on a soft-deleted account reactivates it.
        match self
            .db
            .get_user_flags(&session.access_token, &identity.id)
            .await
        {
            Ok(Some(flags)) if flags.is_deleted => {
                if let Err(e) = self
                    .db
                    .reactivate_user(&session.access_token, &identity.id)
                    .await
                {
                    tracing::warn!(error = %e, "Account reactivation failed");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Could not check soft-delete flags"),
        }

        self.spawn_profile_sync(&session.access_token, &tokens.user);

        self.install_session(identity.clone(), session).await;
        Ok(identity)
    }

    /// Sign-up. An absent session means the address needs confirmation
    /// first; the caller redirects to the verification-pending view.
    pub async fn sign_up_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignUpResult, AppError> {
        let redirect = format!("{}/auth/callback", self.config.backend_url);

        match self.auth.sign_up(email, password, &redirect).await? {
            SignUpOutcome::SignedIn(tokens) => {
                let identity = tokens.user.to_identity();
                let session = tokens.session();
                self.spawn_profile_sync(&session.access_token, &tokens.user);
                self.install_session(identity.clone(), session).await;
                Ok(SignUpResult::SignedIn(identity))
            }
            SignUpOutcome::ConfirmationRequired(_) => Ok(SignUpResult::ConfirmationRequired),
        }
    }

    /// Sign out. Local state is authoritative for UI purposes; the backend
    /// revocation is best-effort cleanup under a fixed budget, and the
    /// user is never left stuck waiting on it.
    pub async fn sign_out(&self) -> Navigation {
        self.storage.set(LOGGING_OUT_KEY, "true");

        let token = self.session_store.access_token().await;

        // Optimistic clear before the backend hears about it.
        {
            let mut state = self.state.write().await;
            state.user = None;
            state.session = None;
            state.profile = None;
            state.subscription = None;
            state.plan_status = PlanStatus::Free;
            state.is_subscriber = false;
        }
        self.session_store.clear().await;

        if let Some(token) = token {
            match tokio::time::timeout(self.config.sign_out_timeout, self.auth.sign_out(&token))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::info!(error = %e, "Sign out completed (session may have been expired)")
                }
                Err(_) => {
                    tracing::warn!("Backend sign-out timed out, proceeding with local cleanup")
                }
            }
        }

        // Enumerated cookie teardown, wholesale storage clear. The marker
        // survives so the guard and event loop know a logout is in flight.
        self.cookies.clear_all();
        self.storage.clear_preserving(&[LOGGING_OUT_KEY]);

        self.auth_events.emit(AuthEvent::SignedOut);

        Navigation::Replace("/login".to_string())
    }

    /// Thin delegation; backend errors re-thrown unchanged.
    pub async fn update_password(&self, new_password: &str) -> Result<(), AppError> {
        let token = self
            .session_store
            .access_token()
            .await
            .ok_or(AppError::Unauthorized)?;
        self.auth
            .update_user(
                &token,
                &UserUpdate {
                    password: Some(new_password.to_string()),
                    email: None,
                },
            )
            .await?;
        Ok(())
    }

    /// Thin delegation; backend errors re-thrown unchanged.
    pub async fn update_email(&self, new_email: &str) -> Result<(), AppError> {
        let token = self
            .session_store
            .access_token()
            .await
            .ok_or(AppError::Unauthorized)?;
        self.auth
            .update_user(
                &token,
                &UserUpdate {
                    password: None,
                    email: Some(new_email.to_string()),
                },
            )
            .await?;
        Ok(())
    }

    /// Thin delegation; backend errors re-thrown unchanged.
    pub async fn reset_password(&self, email: &str) -> Result<(), AppError> {
        let redirect = format!("{}/update-password", self.config.app_url);
        self.auth.recover(email, &redirect).await
    }

    // ─── Internals ───────────────────────────────────────────────

    /// Install a freshly granted session and announce the transition.
    /// The event loop picks the announcement up and runs the fetch.
    async fn install_session(&self, user: Identity, session: Session) {
        self.session_store.set(user.clone(), session.clone()).await;
        {
            let mut state = self.state.write().await;
            state.user = Some(user.clone());
            state.session = Some(session.clone());
        }
        self.auth_events.emit(AuthEvent::SignedIn { user, session });
    }

    /// Detached best-effort profile sync; failure is logged, never awaited
    /// by the primary flow.
    fn spawn_profile_sync(&self, access_token: &str, user: &BackendUser) {
        let db = self.db.clone();
        let token = access_token.to_string();
        let params = SyncUserParams {
            p_user_id: user.id.clone(),
            p_email: user.email.clone(),
            p_full_name: user.full_name(),
            p_avatar_url: user.avatar_url(),
            p_timezone: self.config.timezone.clone(),
            p_login_type: user.provider().to_uppercase(),
            p_stripe_customer_id: None,
        };
        let user_id = user.id.clone();

        tokio::spawn(async move {
            if let Err(e) = db.sync_user(&token, &params).await {
                tracing::warn!(user_id = %user_id, error = %e, "Profile sync failed");
            }
        });
    }
}
