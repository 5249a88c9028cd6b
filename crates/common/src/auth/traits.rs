//! Traits for token endpoint and browser operations
//!
//! These traits enable dependency injection and testing by abstracting
//! external dependencies (the provider's token endpoint, the user's browser).

use async_trait::async_trait;
use authloop_domain::AuthResult;

use super::types::Token;

/// The two token-endpoint calls of the authorization-code protocol
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchange an authorization code for tokens
    ///
    /// # Arguments
    /// * `code` - Authorization code from the redirect callback
    ///
    /// # Errors
    /// Returns `AuthError::TokenExchange` if the request fails, the provider
    /// answers non-2xx, or the body cannot be parsed
    async fn exchange_code(&self, code: &str) -> AuthResult<Token>;

    /// Exchange the refresh token of `current` for a new token
    ///
    /// The returned token keeps `current`'s refresh token when the provider
    /// does not rotate it.
    ///
    /// # Errors
    /// - `AuthError::NoRefreshToken` if `current` has none
    /// - `AuthError::TokenRefresh` if the provider rejects the refresh
    async fn refresh(&self, current: &Token) -> AuthResult<Token>;
}

/// Opens the authorization URL for the user
///
/// Opening a browser window is user-visible; the orchestrator calls this at
/// most once per pending attempt.
pub trait BrowserLauncher: Send + Sync {
    /// # Errors
    /// Returns `AuthError::Browser` if no browser could be launched
    fn open(&self, url: &str) -> AuthResult<()>;
}
