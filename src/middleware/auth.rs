// SPDX-License-Identifier: MIT
// Copyright 2026 PostPilot Engineering <eng@postpilot.dev>

//! Access-token authentication middleware.
//!
//! Sessions are issued by the auth backend; its access tokens are HS256
//! JWTs signed with the project secret, so they can be validated locally
//! without a round trip.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cookie carrying the access token for browser requests.
pub const ACCESS_TOKEN_COOKIE: &str = "pp-access-token";
/// Cookie carrying the refresh token (HttpOnly, never read by JS).
pub const REFRESH_TOKEN_COOKIE: &str = "pp-refresh-token";
/// Non-HttpOnly hint so the frontend can render logged-in chrome early.
pub const LOGGED_IN_HINT_COOKIE: &str = "pp-logged-in";

/// Claims the auth backend puts in its access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Authenticated user extracted from the access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    /// The raw token, forwarded to the data API so row-level security
    /// applies to the caller, not the server.
    pub access_token: String,
}

/// Middleware that requires a valid access token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    };

    let key = DecodingKey::from_secret(&state.config.jwt_secret);
    let mut validation = Validation::new(Algorithm::HS256);
    // The backend stamps an audience of "authenticated"; we only care
    // about signature and expiry here.
    validation.validate_aud = false;

    let token_data =
        decode::<Claims>(&token, &key, &validation).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let auth_user = AuthUser {
        user_id: token_data.claims.sub,
        email: token_data.claims.email,
        access_token: token,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}
