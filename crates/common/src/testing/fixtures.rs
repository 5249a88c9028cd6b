//! Configuration and token fixtures

use authloop_domain::{AuthConfig, AuthTimeouts, AuthorizationMethod};
use chrono::{Duration, Utc};

use crate::auth::Token;

/// Valid configuration for an imaginary provider
///
/// Binds an ephemeral callback port so tests can run in parallel.
#[must_use]
pub fn test_config() -> AuthConfig {
    AuthConfig {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        token_host: "https://idp.test".to_string(),
        authorize_path: "/authorize".to_string(),
        token_path: "/oauth/token".to_string(),
        authorization_method: AuthorizationMethod::Body,
        audience: None,
        callback_url: "http://localhost:8765/oauth/callback".to_string(),
        callback_port: 0,
        scopes: vec!["openid".to_string(), "offline_access".to_string()],
        timeouts: AuthTimeouts { callback_wait_secs: 5, http_request_secs: 5 },
    }
}

/// Token whose expiry is `secs` from now (negative for already expired)
#[must_use]
pub fn token_expiring_in(access: &str, refresh: Option<&str>, secs: i64) -> Token {
    Token {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at: Utc::now() + Duration::seconds(secs),
    }
}
