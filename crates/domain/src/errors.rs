//! Error types used throughout the authorization flow

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy for the OAuth2 authorization-code lifecycle
///
/// `Clone` because a single callback outcome is delivered to every caller
/// waiting on the same pending attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum AuthError {
    /// Invalid configuration, or the callback listener could not bind
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider redirected back with an `error` parameter
    #[error("Authorization denied by provider: {0}")]
    AuthorizationDenied(String),

    /// Authorization-code exchange failed (network, non-2xx or malformed body)
    #[error("Token exchange failed: {message}. URL: {url}")]
    TokenExchange { url: String, message: String },

    /// Refresh-token exchange failed
    #[error("Token refresh failed: {message}. URL: {url}")]
    TokenRefresh { url: String, message: String },

    /// The current token carries no refresh token
    #[error("No refresh token available")]
    NoRefreshToken,

    /// Callback arrived with a state that is not registered
    #[error("Unknown OAuth state: {0}")]
    UnknownState(String),

    /// Nobody completed the browser flow in time
    #[error("Timed out after {0:?} waiting for the OAuth callback")]
    CallbackTimeout(Duration),

    /// Pending attempt was removed before the callback resolved it
    #[error("Authorization attempt abandoned before completion")]
    Abandoned,

    /// The browser hook failed to open the authorization URL
    #[error("Failed to open browser: {0}")]
    Browser(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Helper for exchange failures against `url`
    pub fn token_exchange(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TokenExchange { url: url.into(), message: message.into() }
    }

    /// Helper for refresh failures against `url`
    pub fn token_refresh(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TokenRefresh { url: url.into(), message: message.into() }
    }

    /// True for the failures that send the orchestrator back to the
    /// interactive flow instead of surfacing to the caller.
    #[must_use]
    pub fn is_refresh_failure(&self) -> bool {
        matches!(self, Self::TokenRefresh { .. } | Self::NoRefreshToken)
    }
}

/// Result type alias for authorization operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_error_carries_url() {
        let err = AuthError::token_exchange("https://idp.example.com/token", "HTTP 400");
        let message = err.to_string();
        assert!(message.contains("https://idp.example.com/token"));
        assert!(message.contains("HTTP 400"));
    }

    #[test]
    fn test_refresh_failure_classification() {
        assert!(AuthError::NoRefreshToken.is_refresh_failure());
        assert!(AuthError::token_refresh("u", "m").is_refresh_failure());
        assert!(!AuthError::token_exchange("u", "m").is_refresh_failure());
        assert!(!AuthError::AuthorizationDenied("access_denied".into()).is_refresh_failure());
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let err = AuthError::AuthorizationDenied("access_denied".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "AuthorizationDenied");
        assert_eq!(json["details"], "access_denied");

        let back: AuthError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }
}
