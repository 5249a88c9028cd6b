//! OAuth 2.0 token types
//!
//! Defines the in-memory token, the provider's token endpoint response and
//! the RFC 6749 error body.

use std::fmt;

use authloop_domain::constants::DEFAULT_EXPIRES_IN_SECS;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access token plus the metadata needed to keep it fresh
///
/// Invariant: `access_token` is never empty. `refresh_token` is `None` when
/// the provider did not issue one (an empty string on the wire counts as
/// absent).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Bearer credential for the resource API
    pub access_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Absolute expiry, computed at issuance as now + `expires_in`
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Build a token issued right now
    ///
    /// `expires_in` defaults to one hour when the provider omits it.
    /// Returns `None` when the resulting expiry is not representable.
    #[must_use]
    pub fn issued_now(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
    ) -> Option<Self> {
        let lifetime = Duration::try_seconds(expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS))?;
        let expires_at = Utc::now().checked_add_signed(lifetime)?;
        Some(Self { access_token, refresh_token: refresh_token.filter(|t| !t.is_empty()), expires_at })
    }

    /// True once `expires_at - buffer` is in the past
    #[must_use]
    pub fn is_expiring_soon(&self, buffer: Duration) -> bool {
        self.expires_at.checked_sub_signed(buffer).map_or(true, |deadline| deadline < Utc::now())
    }

    /// Seconds until expiry (negative once expired)
    #[must_use]
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }

    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }
}

// Tokens must never end up in logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// OAuth token response from the authorization server
///
/// Only `access_token` is mandatory; everything else is provider-dependent.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Convert into a `Token`, keeping `previous_refresh` when the provider
    /// did not rotate the refresh token.
    ///
    /// # Errors
    /// Returns a diagnostic when `expires_in` puts the expiry out of range.
    pub fn into_token(self, previous_refresh: Option<String>) -> Result<Token, String> {
        let refresh = self.refresh_token.filter(|t| !t.is_empty()).or(previous_refresh);
        let expires_in = self.expires_in;
        Token::issued_now(self.access_token, refresh, expires_in)
            .ok_or_else(|| format!("expires_in out of range: {}", expires_in.unwrap_or_default()))
    }
}

/// OAuth error response from the authorization server
///
/// Standard OAuth 2.0 error response format (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
pub struct ProviderError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Query parameters the provider appends to the redirect URI
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use super::*;

    /// Validates `Token::issued_now` behavior for the token creation scenario.
    ///
    /// Assertions:
    /// - Confirms fields are carried over.
    /// - Ensures `expires_at` lands roughly one hour out.
    #[test]
    fn test_token_creation() {
        let token = Token::issued_now("AT1".to_string(), Some("RT1".to_string()), Some(3600)).unwrap();

        assert_eq!(token.access_token, "AT1");
        assert_eq!(token.refresh_token.as_deref(), Some("RT1"));
        let secs = token.seconds_until_expiry();
        assert!(secs > 3590 && secs <= 3600, "unexpected lifetime {secs}");
    }

    #[test]
    fn test_missing_expires_in_defaults_to_one_hour() {
        let token = Token::issued_now("AT".to_string(), None, None).unwrap();
        let secs = token.seconds_until_expiry();
        assert!(secs > 3590 && secs <= 3600);
    }

    #[test]
    fn test_empty_refresh_token_is_absent() {
        let token = Token::issued_now("AT".to_string(), Some(String::new()), Some(60)).unwrap();
        assert!(!token.has_refresh_token());
    }

    /// Validates `Token::is_expiring_soon` against the five-minute buffer.
    ///
    /// Assertions:
    /// - A one-hour token is fresh.
    /// - A one-minute token is expiring soon.
    /// - An already expired token is expiring soon.
    #[test]
    fn test_expiry_buffer() {
        let buffer = Duration::minutes(5);
        assert!(!Token::issued_now("a".into(), None, Some(3600)).unwrap().is_expiring_soon(buffer));
        assert!(Token::issued_now("a".into(), None, Some(60)).unwrap().is_expiring_soon(buffer));
        assert!(Token::issued_now("a".into(), None, Some(-10)).unwrap().is_expiring_soon(buffer));
    }

    #[test]
    fn test_response_keeps_previous_refresh_token() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"AT2","expires_in":1800}"#).unwrap();
        let token = response.into_token(Some("RT1".to_string())).unwrap();

        assert_eq!(token.access_token, "AT2");
        assert_eq!(token.refresh_token.as_deref(), Some("RT1"));
    }

    #[test]
    fn test_response_rotated_refresh_token_wins() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"AT2","refresh_token":"RT2","token_type":"Bearer"}"#,
        )
        .unwrap();
        let token = response.into_token(Some("RT1".to_string())).unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("RT2"));
    }

    /// Validates that absurd provider lifetimes are rejected instead of
    /// overflowing the clock arithmetic.
    ///
    /// Assertions:
    /// - Lifetimes beyond `TimeDelta` range fail in both directions.
    /// - A lifetime within `TimeDelta` range but past the calendar limit fails.
    /// - The diagnostic names `expires_in`.
    #[test]
    fn test_out_of_range_expires_in_is_rejected() {
        for lifetime in [100_000_000_000_000_000_i64, -100_000_000_000_000_000, 9_000_000_000_000, i64::MIN] {
            assert!(Token::issued_now("AT".into(), None, Some(lifetime)).is_none(), "{lifetime}");

            let response: TokenResponse = serde_json::from_value(serde_json::json!({
                "access_token": "AT",
                "expires_in": lifetime
            }))
            .unwrap();
            let err = response.into_token(None).unwrap_err();
            assert!(err.contains("expires_in out of range"), "{err}");
        }
    }

    #[test]
    fn test_large_negative_expires_in_is_already_expiring() {
        let token = Token::issued_now("AT".into(), None, Some(-8_000_000_000_000)).unwrap();
        assert!(token.is_expiring_soon(Duration::minutes(5)));
    }

    #[test]
    fn test_response_requires_access_token() {
        let parsed = serde_json::from_str::<TokenResponse>(r#"{"refresh_token":"RT"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let token = Token::issued_now("secret-at".into(), Some("secret-rt".into()), None).unwrap();
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("secret-at"));
        assert!(!rendered.contains("secret-rt"));
    }

    #[test]
    fn test_provider_error_display() {
        let error = ProviderError {
            error: "invalid_grant".to_string(),
            error_description: Some("The refresh token is invalid".to_string()),
        };
        assert_eq!(error.to_string(), "invalid_grant: The refresh token is invalid");

        let error = ProviderError { error: "invalid_request".to_string(), error_description: None };
        assert_eq!(error.to_string(), "invalid_request");
    }
}
