//! Token endpoint client
//!
//! Performs the two token-endpoint calls of the authorization-code flow:
//! - authorization code → tokens
//! - refresh token → tokens
//!
//! Both are form-encoded POSTs to `token_host + token_path`.

use std::sync::Arc;

use async_trait::async_trait;
use authloop_domain::{AuthConfig, AuthError, AuthResult, AuthorizationMethod};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response};
use tracing::{info, warn};

use super::traits::TokenExchanger;
use super::types::{ProviderError, Token, TokenResponse};

/// reqwest-backed [`TokenExchanger`]
#[derive(Debug, Clone)]
pub struct HttpTokenExchanger {
    config: Arc<AuthConfig>,
    client: Client,
}

impl HttpTokenExchanger {
    /// Create an exchanger with its own HTTP client
    ///
    /// The client uses the configured per-request timeout. Setting
    /// `AUTHLOOP_DISABLE_PROXY` bypasses system proxies (useful against local
    /// stub servers).
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: Arc<AuthConfig>) -> AuthResult<Self> {
        let builder = Client::builder().timeout(config.http_timeout());
        let builder = if std::env::var_os("AUTHLOOP_DISABLE_PROXY").is_some() {
            builder.no_proxy()
        } else {
            builder
        };
        let client = builder
            .build()
            .map_err(|err| AuthError::Configuration(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { config, client })
    }

    /// Create an exchanger sharing an existing client
    #[must_use]
    pub fn with_client(config: Arc<AuthConfig>, client: Client) -> Self {
        Self { config, client }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Value of the HTTP Basic `Authorization` header for the client
    /// credentials
    #[must_use]
    pub fn basic_credentials(&self) -> String {
        let raw = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!("Basic {}", STANDARD.encode(raw))
    }

    async fn exchange_code_inner(&self, code: &str, url: &str) -> Result<Token, String> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.callback_url.as_str()),
        ];

        let mut request = self.client.post(url);
        match self.config.authorization_method {
            AuthorizationMethod::Body => {
                form.push(("client_id", self.config.client_id.as_str()));
                form.push(("client_secret", self.config.client_secret.as_str()));
            }
            AuthorizationMethod::Header => {
                request = request.header(AUTHORIZATION, self.basic_credentials());
            }
        }

        let response = request.form(&form).send().await.map_err(|e| e.to_string())?;
        read_token_response(response).await?.into_token(None)
    }

    async fn refresh_inner(&self, refresh_token: &str, url: &str) -> Result<TokenResponse, String> {
        // Providers observed in the field only accept refresh credentials in
        // the body, regardless of the configured authorization method.
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response =
            self.client.post(url).form(&form).send().await.map_err(|e| e.to_string())?;
        read_token_response(response).await
    }
}

/// Parse a token endpoint response, rendering failures as diagnostics
async fn read_token_response(response: Response) -> Result<TokenResponse, String> {
    let status = response.status();
    let body = response.text().await.map_err(|e| format!("failed to read response body: {e}"))?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<ProviderError>(&body) {
            Ok(provider) => format!("HTTP {status}: {provider}"),
            Err(_) => format!("HTTP {status}: {body}"),
        });
    }

    let parsed: TokenResponse =
        serde_json::from_str(&body).map_err(|e| format!("malformed token response: {e}"))?;

    if parsed.access_token.is_empty() {
        return Err("token response carried an empty access_token".to_string());
    }

    Ok(parsed)
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange_code(&self, code: &str) -> AuthResult<Token> {
        let url = self.config.token_url();
        match self.exchange_code_inner(code, &url).await {
            Ok(token) => {
                info!(
                    expires_in = token.seconds_until_expiry(),
                    has_refresh_token = token.has_refresh_token(),
                    "Exchanged authorization code for token"
                );
                Ok(token)
            }
            Err(message) => {
                warn!(url = %url, error = %message, "Authorization code exchange failed");
                Err(AuthError::token_exchange(url, message))
            }
        }
    }

    async fn refresh(&self, current: &Token) -> AuthResult<Token> {
        let refresh_token = current.refresh_token.as_deref().ok_or(AuthError::NoRefreshToken)?;
        let url = self.config.token_url();

        let refreshed = self
            .refresh_inner(refresh_token, &url)
            .await
            .and_then(|response| response.into_token(current.refresh_token.clone()));

        match refreshed {
            Ok(token) => {
                info!(expires_in = token.seconds_until_expiry(), "Refreshed access token");
                Ok(token)
            }
            Err(message) => {
                warn!(url = %url, error = %message, "Token refresh failed");
                Err(AuthError::token_refresh(url, message))
            }
        }
    }
}
