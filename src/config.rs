//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and cached in memory. In production
//! the deployment platform injects them as environment variables.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Non-sensitive ---
    /// Public origin of the web frontend (redirect targets, CORS)
    pub app_url: String,
    /// Base URL of the managed auth backend
    pub auth_url: String,
    /// Server port
    pub port: u16,
    /// Development mode (Turnstile bypass, non-Secure cookies)
    pub dev_mode: bool,
    /// Stripe price for the Pro plan
    pub stripe_price_id: String,
    /// Budget for the best-effort backend sign-out call (milliseconds)
    pub sign_out_timeout_ms: u64,

    // --- Secrets ---
    /// Publishable (anon) API key for the auth backend
    pub auth_anon_key: String,
    /// Service-role API key for the auth backend (server-only)
    pub auth_service_key: String,
    /// Secret the auth backend signs access tokens with (HS256)
    pub jwt_secret: Vec<u8>,
    /// Key for signing the OAuth intent state (raw bytes)
    pub oauth_state_key: Vec<u8>,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Turnstile secret key (may be empty in development)
    pub turnstile_secret_key: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let dev_mode = env::var("APP_ENV")
            .map(|v| v != "production")
            .unwrap_or(true);

        Ok(Self {
            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            auth_url: env::var("AUTH_URL").map_err(|_| ConfigError::Missing("AUTH_URL"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            dev_mode,
            stripe_price_id: env::var("STRIPE_PRICE_ID")
                .map_err(|_| ConfigError::Missing("STRIPE_PRICE_ID"))?,
            sign_out_timeout_ms: env::var("SIGN_OUT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),

            auth_anon_key: env::var("AUTH_ANON_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("AUTH_ANON_KEY"))?,
            auth_service_key: env::var("AUTH_SERVICE_ROLE_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("AUTH_SERVICE_ROLE_KEY"))?,
            jwt_secret: env::var("AUTH_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("AUTH_JWT_SECRET"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRIPE_SECRET_KEY"))?,
            turnstile_secret_key: env::var("TURNSTILE_SECRET_KEY")
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
        })
    }

    /// Fixed configuration for tests.
    pub fn test_default() -> Self {
        Self {
            app_url: "http://localhost:3000".to_string(),
            auth_url: "http://auth.invalid".to_string(),
            port: 8080,
            dev_mode: true,
            stripe_price_id: "price_test_123".to_string(),
            sign_out_timeout_ms: 3000,
            auth_anon_key: "test_anon_key".to_string(),
            auth_service_key: "test_service_key".to_string(),
            jwt_secret: b"test_jwt_secret_32_bytes_minimum!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            stripe_secret_key: "sk_test_123".to_string(),
            turnstile_secret_key: String::new(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
