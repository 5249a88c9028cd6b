//! Provider configuration for the authorization-code flow
//!
//! `AuthConfig` is built once at process start (see `authloop-infra`'s
//! loader) and never mutated afterwards. Field names are snake_case; the
//! camelCase spellings used by older config files are accepted as aliases.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{DEFAULT_CALLBACK_WAIT_SECS, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::errors::{AuthError, AuthResult};
use crate::impl_str_enum_conversions;

/// Where client credentials travel on the authorization-code exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationMethod {
    /// `client_id` / `client_secret` form fields
    Body,
    /// HTTP Basic `Authorization` header
    Header,
}

impl_str_enum_conversions!(AuthorizationMethod {
    Body => "body",
    Header => "header",
});

/// Timeouts around the two suspension points of an interactive flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTimeouts {
    /// Seconds to wait for the browser callback. `0` waits forever.
    #[serde(default = "default_callback_wait_secs")]
    pub callback_wait_secs: u64,

    /// Per-request timeout for token endpoint calls
    #[serde(default = "default_http_timeout_secs")]
    pub http_request_secs: u64,
}

fn default_callback_wait_secs() -> u64 {
    DEFAULT_CALLBACK_WAIT_SECS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl Default for AuthTimeouts {
    fn default() -> Self {
        Self {
            callback_wait_secs: DEFAULT_CALLBACK_WAIT_SECS,
            http_request_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// Static OAuth2 provider configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(alias = "clientId")]
    pub client_id: String,

    #[serde(alias = "clientSecret")]
    pub client_secret: String,

    /// Provider origin, e.g. `https://idp.example.com`. A bare host gets
    /// `https://` prepended.
    #[serde(alias = "tokenHost")]
    pub token_host: String,

    #[serde(alias = "authorizePath")]
    pub authorize_path: String,

    #[serde(alias = "tokenPath")]
    pub token_path: String,

    #[serde(alias = "authorizationMethod")]
    pub authorization_method: AuthorizationMethod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Redirect URI registered with the provider
    #[serde(alias = "callbackURL", alias = "callbackUrl")]
    pub callback_url: String,

    /// Loopback port the callback listener binds. `0` picks an ephemeral port.
    #[serde(alias = "callbackPort")]
    pub callback_port: u16,

    pub scopes: Vec<String>,

    #[serde(default)]
    pub timeouts: AuthTimeouts,
}

impl AuthConfig {
    /// Reject incomplete or malformed configuration at startup
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` naming the first offending field.
    pub fn validate(&self) -> AuthResult<()> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("token_host", &self.token_host),
            ("authorize_path", &self.authorize_path),
            ("token_path", &self.token_path),
            ("callback_url", &self.callback_url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AuthError::Configuration(format!("{field} must not be empty")));
            }
        }

        if matches!(&self.audience, Some(audience) if audience.trim().is_empty()) {
            return Err(AuthError::Configuration(
                "audience must be omitted rather than empty".to_string(),
            ));
        }

        Url::parse(&self.provider_origin()).map_err(|e| {
            AuthError::Configuration(format!("token_host is not a valid URL: {e}"))
        })?;

        let callback = Url::parse(&self.callback_url).map_err(|e| {
            AuthError::Configuration(format!("callback_url is not a valid URL: {e}"))
        })?;
        if !matches!(callback.scheme(), "http" | "https") {
            return Err(AuthError::Configuration(format!(
                "callback_url must use http or https, got {}",
                callback.scheme()
            )));
        }

        if self.scopes.iter().all(|scope| scope.trim().is_empty()) {
            return Err(AuthError::Configuration("at least one scope is required".to_string()));
        }

        Ok(())
    }

    /// Provider origin with a scheme guaranteed
    #[must_use]
    pub fn provider_origin(&self) -> String {
        let host = self.token_host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }

    /// Token endpoint: `token_host + token_path`
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}{}", self.provider_origin(), self.token_path)
    }

    /// Authorization endpoint without query string
    #[must_use]
    pub fn authorize_endpoint(&self) -> String {
        format!("{}{}", self.provider_origin(), self.authorize_path)
    }

    /// Scopes as the space-separated wire value
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Callback wait bound, `None` when configured to wait forever
    #[must_use]
    pub fn callback_wait(&self) -> Option<Duration> {
        match self.timeouts.callback_wait_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.http_request_secs)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_host", &self.token_host)
            .field("authorize_path", &self.authorize_path)
            .field("token_path", &self.token_path)
            .field("authorization_method", &self.authorization_method)
            .field("audience", &self.audience)
            .field("callback_url", &self.callback_url)
            .field("callback_port", &self.callback_port)
            .field("scopes", &self.scopes)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthConfig {
        AuthConfig {
            client_id: "client123".to_string(),
            client_secret: "s3cret".to_string(),
            token_host: "https://idp.example.com".to_string(),
            authorize_path: "/oauth2/authorize".to_string(),
            token_path: "/oauth2/token".to_string(),
            authorization_method: AuthorizationMethod::Header,
            audience: None,
            callback_url: "http://localhost:3000/oauth/callback".to_string(),
            callback_port: 3000,
            scopes: vec!["openid".to_string(), "patient/*.read".to_string()],
            timeouts: AuthTimeouts::default(),
        }
    }

    /// Validates the endpoint URL derivation scenario.
    ///
    /// Assertions:
    /// - Confirms `token_url()` and `authorize_endpoint()` join host and path.
    /// - Confirms `scope_string()` joins scopes with a single space.
    #[test]
    fn test_endpoint_urls() {
        let config = sample();
        assert_eq!(config.token_url(), "https://idp.example.com/oauth2/token");
        assert_eq!(config.authorize_endpoint(), "https://idp.example.com/oauth2/authorize");
        assert_eq!(config.scope_string(), "openid patient/*.read");
    }

    #[test]
    fn test_bare_host_gets_https() {
        let mut config = sample();
        config.token_host = "idp.example.com/".to_string();
        assert_eq!(config.authorize_endpoint(), "https://idp.example.com/oauth2/authorize");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(sample().validate().is_ok());
    }

    /// Validates `AuthConfig::validate` behavior for missing required fields.
    ///
    /// Assertions:
    /// - Each blanked field yields `AuthError::Configuration` naming it.
    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut config = sample();
        config.client_secret = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err, AuthError::Configuration("client_secret must not be empty".to_string()));

        let mut config = sample();
        config.token_path = String::new();
        assert!(matches!(config.validate(), Err(AuthError::Configuration(msg)) if msg.contains("token_path")));

        let mut config = sample();
        config.scopes = vec![" ".to_string()];
        assert!(matches!(config.validate(), Err(AuthError::Configuration(msg)) if msg.contains("scope")));
    }

    #[test]
    fn test_validate_rejects_bad_callback_url() {
        let mut config = sample();
        config.callback_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(AuthError::Configuration(_))));

        config.callback_url = "ftp://localhost/cb".to_string();
        assert!(matches!(config.validate(), Err(AuthError::Configuration(msg)) if msg.contains("ftp")));
    }

    #[test]
    fn test_validate_rejects_empty_audience() {
        let mut config = sample();
        config.audience = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_callback_wait_zero_means_unbounded() {
        let mut config = sample();
        assert_eq!(config.callback_wait(), Some(Duration::from_secs(300)));
        config.timeouts.callback_wait_secs = 0;
        assert_eq!(config.callback_wait(), None);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    /// Validates deserialization of the camelCase field spellings.
    ///
    /// Assertions:
    /// - Confirms aliases map onto snake_case fields.
    /// - Confirms `timeouts` falls back to defaults when absent.
    #[test]
    fn test_deserialize_camel_case_aliases() {
        let json = r#"{
            "clientId": "abc",
            "clientSecret": "xyz",
            "tokenHost": "https://idp.example.com",
            "authorizePath": "/authorize",
            "tokenPath": "/token",
            "authorizationMethod": "body",
            "audience": "https://fhir.example.com",
            "callbackURL": "http://localhost:8080/oauth/callback",
            "callbackPort": 8080,
            "scopes": ["openid"]
        }"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.client_id, "abc");
        assert_eq!(config.authorization_method, AuthorizationMethod::Body);
        assert_eq!(config.audience.as_deref(), Some("https://fhir.example.com"));
        assert_eq!(config.callback_port, 8080);
        assert_eq!(config.timeouts, AuthTimeouts::default());
    }

    #[test]
    fn test_deserialize_toml() {
        let toml_src = r#"
            client_id = "abc"
            client_secret = "xyz"
            token_host = "idp.example.com"
            authorize_path = "/authorize"
            token_path = "/token"
            authorization_method = "header"
            callback_url = "http://localhost:8080/oauth/callback"
            callback_port = 8080
            scopes = ["openid", "offline_access"]

            [timeouts]
            callback_wait_secs = 0
        "#;
        let config: AuthConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.authorization_method, AuthorizationMethod::Header);
        assert_eq!(config.callback_wait(), None);
        assert_eq!(config.timeouts.http_request_secs, 30);
    }

    #[test]
    fn test_authorization_method_parse() {
        assert_eq!("Header".parse::<AuthorizationMethod>(), Ok(AuthorizationMethod::Header));
        assert!("basic".parse::<AuthorizationMethod>().is_err());
    }
}
