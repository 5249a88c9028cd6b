//! In-memory token holder
//!
//! Holds zero or one token for the session and answers freshness questions.
//! Pure state: refresh policy lives in the orchestrator.

use authloop_domain::constants::EXPIRY_BUFFER_SECS;
use chrono::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::Token;

/// Thread-safe holder for the current token
pub struct TokenStore {
    current: RwLock<Option<Token>>,
    buffer: Duration,
}

impl TokenStore {
    /// Empty store with the standard five-minute expiry buffer
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer(Duration::seconds(EXPIRY_BUFFER_SECS))
    }

    #[must_use]
    pub fn with_buffer(buffer: Duration) -> Self {
        Self { current: RwLock::new(None), buffer }
    }

    /// Current token, if any
    pub async fn get(&self) -> Option<Token> {
        self.current.read().await.clone()
    }

    /// Replace the stored token wholesale
    pub async fn set(&self, token: Token) {
        debug!(expires_at = %token.expires_at, "Storing token");
        *self.current.write().await = Some(token);
    }

    /// Drop the stored token
    pub async fn clear(&self) {
        if self.current.write().await.take().is_some() {
            debug!("Token cleared");
        }
    }

    /// True when there is no token or it expires within the buffer
    pub async fn is_expiring_soon(&self) -> bool {
        self.current.read().await.as_ref().map_or(true, |t| t.is_expiring_soon(self.buffer))
    }

    /// Access token string without any freshness check
    pub async fn access_token(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|t| t.access_token.clone())
    }

    pub async fn seconds_until_expiry(&self) -> Option<i64> {
        self.current.read().await.as_ref().map(Token::seconds_until_expiry)
    }

    #[must_use]
    pub fn buffer(&self) -> Duration {
        self.buffer
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").field("buffer", &self.buffer).finish_non_exhaustive()
    }
}
