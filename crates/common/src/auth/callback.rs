//! Loopback HTTP listener for OAuth redirects
//!
//! Serves `GET /health` and `GET /oauth/callback` on 127.0.0.1. Each callback
//! is matched to a pending attempt by its `state` parameter. The handler
//! claims the state before doing any work, so a replayed or concurrent
//! duplicate callback is answered as an unknown state and never reaches the
//! token endpoint. The claim removes the attempt whatever the outcome.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use authloop_domain::constants::{CALLBACK_PATH, HEALTH_PATH};
use authloop_domain::{AuthError, AuthResult};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::registry::PendingAuthRegistry;
use super::state::redact_state;
use super::token_store::TokenStore;
use super::traits::TokenExchanger;
use super::types::CallbackParams;

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization Successful</h1><p>You can close this window and return to the application.</p></body>
</html>"#;

const DENIED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Denied</h1><p>The provider did not grant access. You can close this window.</p></body>
</html>"#;

const MISSING_CODE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>The callback did not include an authorization code.</p></body>
</html>"#;

const EXCHANGE_FAILED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>The authorization code could not be exchanged for a token. Check the application logs.</p></body>
</html>"#;

/// Everything the callback handler needs to finish an attempt
pub struct CallbackContext<X> {
    pub store: Arc<TokenStore>,
    pub registry: Arc<PendingAuthRegistry>,
    pub exchanger: Arc<X>,
}

impl<X> Clone for CallbackContext<X> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            exchanger: Arc::clone(&self.exchanger),
        }
    }
}

/// Build the listener's routes over `context`
pub fn callback_router<X>(context: CallbackContext<X>) -> Router
where
    X: TokenExchanger + 'static,
{
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(CALLBACK_PATH, get(handle_callback::<X>))
        .with_state(context)
}

async fn health() -> &'static str {
    "OAuth callback server is running"
}

async fn handle_callback<X>(
    State(context): State<CallbackContext<X>>,
    Query(params): Query<CallbackParams>,
) -> Response
where
    X: TokenExchanger + 'static,
{
    // The claim is dropped on every exit path, including a cancelled request.
    let Some(claim) = params.state.as_deref().and_then(|s| context.registry.claim(s)) else {
        let rejected = AuthError::UnknownState(params.state.as_deref().map(redact_state).unwrap_or_default());
        warn!(error = %rejected, "OAuth callback rejected");
        return (StatusCode::BAD_REQUEST, "Invalid state").into_response();
    };
    let state = redact_state(claim.state());

    if let Some(error) = params.error.as_deref() {
        let reason = match params.error_description.as_deref() {
            Some(description) => format!("{error}: {description}"),
            None => error.to_string(),
        };
        warn!(%state, %reason, "Provider denied authorization");
        claim.resolve(Err(AuthError::AuthorizationDenied(reason)));
        return (StatusCode::FORBIDDEN, Html(DENIED_PAGE)).into_response();
    }

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        warn!(%state, "OAuth callback without authorization code");
        claim.resolve(Err(AuthError::token_exchange(
            CALLBACK_PATH,
            "callback did not include an authorization code",
        )));
        return (StatusCode::BAD_REQUEST, Html(MISSING_CODE_PAGE)).into_response();
    };

    match context.exchanger.exchange_code(code).await {
        Ok(token) => {
            context.store.set(token).await;
            claim.resolve(Ok(()));
            info!(%state, "OAuth authorization completed");
            (StatusCode::OK, Html(SUCCESS_PAGE)).into_response()
        }
        Err(err) => {
            error!(%state, error = %err, "Authorization code exchange failed");
            claim.resolve(Err(err));
            (StatusCode::INTERNAL_SERVER_ERROR, Html(EXCHANGE_FAILED_PAGE)).into_response()
        }
    }
}

/// Running loopback server
pub struct CallbackListener {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Bind 127.0.0.1:`port` and serve `router` in a background task
    ///
    /// Port 0 binds an ephemeral port; read it back with [`Self::local_addr`].
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if the port cannot be bound.
    pub async fn start(router: Router, port: u16) -> AuthResult<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::AddrInUse {
                AuthError::Configuration(format!("port {port} is already in use"))
            } else {
                AuthError::Configuration(format!("failed to bind OAuth callback listener: {err}"))
            }
        })?;

        let local_addr = listener.local_addr().map_err(|err| {
            AuthError::Configuration(format!("failed to determine callback listener address: {err}"))
        })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("OAuth callback server error: {}", err);
            }
        });

        info!(%local_addr, "OAuth callback listener started");

        Ok(Self { local_addr, shutdown_tx: Some(shutdown_tx), handle: Some(handle) })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the server task
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if the server task panicked.
    pub async fn shutdown(mut self) -> AuthResult<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    return Err(AuthError::Internal(format!(
                        "OAuth callback server panicked: {err}"
                    )));
                }
            }
        }

        info!(local_addr = %self.local_addr, "OAuth callback listener stopped");
        Ok(())
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for CallbackListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackListener").field("local_addr", &self.local_addr).finish()
    }
}
