// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! OAuth authentication routes.
//!
//! The OAuth redirect loses client-side router state, so the start route
//! signs the navigation intent (signup / payment / subscription redirect)
//! into a state parameter that rides along on the callback URL. The
//! callback verifies it, exchanges the code, establishes session cookies
//! and redirects wherever the intent points.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::db::SyncUserParams;
use crate::error::{AppError, Result};
use crate::middleware::auth::{ACCESS_TOKEN_COOKIE, LOGGED_IN_HINT_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::models::Session;
use crate::services::auth_api::BackendUser;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", get(auth_start))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/logout", post(logout))
}

/// Navigation intent carried across the OAuth redirect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OAuthIntent {
    pub signup: bool,
    pub payment: bool,
    pub redirect_to_subscription: bool,
}

impl OAuthIntent {
    fn encode(&self) -> String {
        format!(
            "signup={}&payment={}&redirect_to_subscription={}",
            self.signup as u8, self.payment as u8, self.redirect_to_subscription as u8
        )
    }

    fn decode(s: &str) -> Option<Self> {
        let mut intent = Self::default();
        for pair in s.split('&') {
            let (key, value) = pair.split_once('=')?;
            let flag = match value {
                "1" => true,
                "0" => false,
                _ => return None,
            };
            match key {
                "signup" => intent.signup = flag,
                "payment" => intent.payment = flag,
                "redirect_to_subscription" => intent.redirect_to_subscription = flag,
                _ => return None,
            }
        }
        Some(intent)
    }
}

/// Sign the intent + timestamp into an opaque state token.
fn sign_intent(intent: &OAuthIntent, key: &[u8]) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    // "intent|timestamp_hex", then "payload|signature_hex"
    let payload = format!("{}|{:x}", intent.encode(), timestamp);

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify the HMAC signature and decode the intent from the state token.
fn verify_and_decode_intent(state: &str, key: &[u8]) -> Option<OAuthIntent> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "intent|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let payload = format!("{}|{}", parts[0], parts[1]);
    let claimed = hex::decode(parts[2]).ok()?;

    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(payload.as_bytes());
    let expected = mac.finalize().into_bytes();

    if expected.as_slice().ct_eq(claimed.as_slice()).unwrap_u8() != 1 {
        tracing::error!("OAuth intent signature mismatch! Potential tampering.");
        return None;
    }

    OAuthIntent::decode(parts[0])
}

/// Query parameters for starting the OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    #[serde(default)]
    signup: bool,
    #[serde(default)]
    payment: bool,
    #[serde(default)]
    redirect_to_subscription: bool,
}

/// Derive this service's externally visible origin from the Host header.
fn service_origin(headers: &axum::http::HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            std::env::var("API_HOST").unwrap_or_else(|_| "localhost:8080".to_string())
        });

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}", scheme, host)
}

/// Start the OAuth flow - redirect to the auth backend's authorize URL.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let intent = OAuthIntent {
        signup: params.signup,
        payment: params.payment,
        redirect_to_subscription: params.redirect_to_subscription,
    };

    let intent_token = sign_intent(&intent, &state.config.oauth_state_key)?;
    let callback_url = format!(
        "{}/auth/callback?intent={}",
        service_origin(&headers),
        intent_token
    );

    let auth_url = state.auth.authorize_url("google", &callback_url);

    tracing::info!(
        signup = intent.signup,
        payment = intent.payment,
        "Starting OAuth flow, redirecting to provider"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth callback - exchange the code, set session cookies, redirect by intent.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let app_url = &state.config.app_url;

    // Provider-reported errors go straight back to the login form.
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from provider");
        let description = params.error_description.unwrap_or_default();
        let redirect = format!(
            "{}/login?error={}&description={}",
            app_url,
            urlencoding::encode(&error),
            urlencoding::encode(&description)
        );
        return Ok(Redirect::temporary(&redirect).into_response());
    }

    let Some(code) = params.code else {
        tracing::warn!("No code or error in callback URL");
        return Ok(Redirect::temporary(&format!("{}/login?error=missing-code", app_url)).into_response());
    };

    // Tampered or absent intent falls back to a plain sign-in.
    let intent = params
        .intent
        .as_deref()
        .and_then(|s| verify_and_decode_intent(s, &state.config.oauth_state_key))
        .unwrap_or_else(|| {
            if params.intent.is_some() {
                tracing::warn!("Invalid or tampered intent parameter, using defaults");
            }
            OAuthIntent::default()
        });

    tracing::info!("Exchanging authorization code for session");

    let tokens = match state.auth.exchange_code(&code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!(error = %e, "Code exchange failed");
            let redirect = format!(
                "{}/login?error=auth-failed&message={}",
                app_url,
                urlencoding::encode(&e.to_string())
            );
            return Ok(Redirect::temporary(&redirect).into_response());
        }
    };

    let session = tokens.session();
    let user = tokens.user.clone();

    tracing::info!(user_id = %user.id, "OAuth successful, session established");

    // Profile sync rides along with the sign-in; its failure never blocks
    // the redirect.
    spawn_profile_sync(&state, &session.access_token, &user);

    let redirect_path = if intent.signup && intent.redirect_to_subscription {
        "/register?redirect_to_subscription=true".to_string()
    } else if intent.signup {
        "/dashboard/onboarding".to_string()
    } else if intent.payment {
        "/checkout".to_string()
    } else {
        match state
            .db
            .get_onboarding_completed(&session.access_token, &user.id)
            .await
        {
            Ok(Some(true)) => "/dashboard".to_string(),
            Ok(_) => "/dashboard/onboarding".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not check onboarding status");
                "/dashboard".to_string()
            }
        }
    };

    tracing::info!(redirect = %redirect_path, "Redirecting after callback");

    let jar = add_session_cookies(jar, &state, &session);
    let redirect = format!("{}{}", app_url, redirect_path);

    Ok((
        jar,
        [(header::CACHE_CONTROL, "no-store, max-age=0")],
        Redirect::temporary(&redirect),
    )
        .into_response())
}

/// Fire-and-forget profile sync after a successful authentication.
fn spawn_profile_sync(state: &Arc<AppState>, access_token: &str, user: &BackendUser) {
    let db = state.db.clone();
    let token = access_token.to_string();
    let params = SyncUserParams {
        p_user_id: user.id.clone(),
        p_email: user.email.clone(),
        p_full_name: user.full_name(),
        p_avatar_url: user.avatar_url(),
        p_timezone: None,
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

// ─── Session cookies ─────────────────────────────────────────────

/// Whether cookies should carry the Secure attribute.
fn cookies_secure(state: &AppState) -> bool {
    state.config.app_url.starts_with("https://")
}

/// Domain for the logged-in hint cookie so frontend subdomains see it.
/// Host-only for localhost and single-label hosts.
fn hint_cookie_domain(state: &AppState) -> Option<String> {
    let host = state
        .config
        .app_url
        .split("://")
        .nth(1)?
        .split([':', '/'])
        .next()?;

    if host == "localhost" || host.parse::<std::net::IpAddr>().is_ok() {
        return None;
    }

    // app.example.com -> .example.com
    let parent = host.split_once('.')?.1;
    if parent.contains('.') {
        Some(format!(".{}", parent))
    } else {
        None
    }
}

const REFRESH_COOKIE_MAX_AGE: time::Duration = time::Duration::days(30);

fn add_session_cookies(jar: CookieJar, state: &AppState, session: &Session) -> CookieJar {
    let secure = cookies_secure(state);
    let access_max_age = time::Duration::seconds(
        (session.expires_at - chrono::Utc::now().timestamp()).max(0),
    );

    let access = Cookie::build((ACCESS_TOKEN_COOKIE, session.access_token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(access_max_age)
        .build();

    let refresh = Cookie::build((REFRESH_TOKEN_COOKIE, session.refresh_token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(REFRESH_COOKIE_MAX_AGE)
        .build();

    let mut hint = Cookie::build((LOGGED_IN_HINT_COOKIE, "1"))
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(REFRESH_COOKIE_MAX_AGE);
    if let Some(domain) = hint_cookie_domain(state) {
        hint = hint.domain(domain);
    }

    jar.add(access).add(refresh).add(hint.build())
}

/// Removal attributes must match the creation attributes or browsers keep
/// the original cookie.
fn removal_cookies(state: &AppState) -> Vec<Cookie<'static>> {
    let secure = cookies_secure(state);
    let expired = time::Duration::ZERO;

    let access = Cookie::build((ACCESS_TOKEN_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(expired)
        .build();

    let refresh = Cookie::build((REFRESH_TOKEN_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(expired)
        .build();

    let mut hint = Cookie::build((LOGGED_IN_HINT_COOKIE, ""))
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(expired);
    if let Some(domain) = hint_cookie_domain(state) {
        hint = hint.domain(domain);
    }

    vec![access, refresh, hint.build()]
}

/// Logout - best-effort backend revocation, unconditional cookie teardown.
///
/// The backend call is advisory: if it hangs past the configured budget the
/// local cleanup proceeds anyway.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        let token = cookie.value().to_string();
        let budget = Duration::from_millis(state.config.sign_out_timeout_ms);

        match tokio::time::timeout(budget, state.auth.sign_out(&token)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Backend sign-out failed, clearing anyway"),
            Err(_) => tracing::warn!("Backend sign-out timed out, clearing anyway"),
        }
    }

    let mut jar = jar;
    for cookie in removal_cookies(&state) {
        jar = jar.add(cookie);
    }

    (jar, StatusCode::NO_CONTENT).into_response()
}
