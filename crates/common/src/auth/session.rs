//! Auth session orchestrator
//!
//! [`AuthSession`] is the single entry point callers use. It owns the token
//! store, the pending-attempt registry and the loopback listener, and
//! guarantees a fresh token before running a caller's operation:
//!
//! 1. start the callback listener (once)
//! 2. fresh token: run the operation
//! 3. expiring token: refresh it (serialized across callers); on failure
//!    clear the store and fall through to step 4
//! 4. no token: open the browser once for all concurrent callers and wait
//!    for the callback to resolve the attempt
//!
//! Step 4 runs at most once per call, so a permanently broken refresh token
//! cannot loop. Callers joining an attempt share its deadline, and the attempt
//! is abandoned as soon as its last waiter goes away.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authloop_domain::{AuthConfig, AuthError, AuthResult};
use axum::Router;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::browser::SystemBrowser;
use super::callback::{callback_router, CallbackContext, CallbackListener};
use super::exchanger::HttpTokenExchanger;
use super::registry::{CompletionHandle, PendingAuthRegistry};
use super::state::{generate_state, redact_state};
use super::token_store::TokenStore;
use super::traits::{BrowserLauncher, TokenExchanger};
use super::types::Token;

enum Attempt {
    // Another caller finished the flow while we queued for the slot.
    Ready(Token),
    Waiting(Ticket),
}

/// Interactive attempt shared by every caller that joined it
struct InFlight {
    handle: CompletionHandle,
    // Fixed when the browser opens; `None` waits indefinitely.
    deadline: Option<(Instant, Duration)>,
    waiters: Arc<AtomicUsize>,
}

impl InFlight {
    /// Register one more waiter; fails once the last waiter has left
    fn join(&self) -> Option<Ticket> {
        self.waiters
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n > 0).then_some(n + 1))
            .ok()?;
        Some(self.ticket())
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            handle: self.handle.clone(),
            deadline: self.deadline,
            waiters: Arc::clone(&self.waiters),
        }
    }
}

/// One caller's share of an [`InFlight`] attempt
struct Ticket {
    handle: CompletionHandle,
    deadline: Option<(Instant, Duration)>,
    waiters: Arc<AtomicUsize>,
}

// Abandons the attempt when its last waiter leaves, including a dropped
// `execute` future.
struct LeaveOnDrop<'a> {
    registry: &'a PendingAuthRegistry,
    state: String,
    waiters: Arc<AtomicUsize>,
}

impl Drop for LeaveOnDrop<'_> {
    fn drop(&mut self) {
        if self.waiters.fetch_sub(1, Ordering::SeqCst) == 1 && self.registry.remove(&self.state) {
            debug!(state = %redact_state(&self.state), "Last waiter left; pending authorization abandoned");
        }
    }
}

/// Process-lifetime OAuth session
///
/// Construct once at startup and share by reference (or `Arc`) with every
/// component that calls the protected API.
///
/// # Example
///
/// ```no_run
/// use authloop_common::auth::AuthSession;
/// use authloop_domain::{AuthConfig, AuthError};
///
/// # async fn demo(config: AuthConfig) -> Result<(), AuthError> {
/// let session = AuthSession::new(config)?;
/// let token_len = session
///     .execute_with_token(|token| async move {
///         // call the resource API with `Authorization: Bearer {token}`
///         Ok::<_, AuthError>(token.len())
///     })
///     .await?;
/// session.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct AuthSession<X = HttpTokenExchanger, B = SystemBrowser> {
    config: Arc<AuthConfig>,
    store: Arc<TokenStore>,
    registry: Arc<PendingAuthRegistry>,
    exchanger: Arc<X>,
    browser: Arc<B>,
    listener: Mutex<Option<CallbackListener>>,
    in_flight: Mutex<Option<InFlight>>,
    refresh_lock: Mutex<()>,
    shut_down: AtomicBool,
}

impl AuthSession {
    /// Session talking to the configured provider over HTTP and opening the
    /// system browser
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if `config` is incomplete.
    pub fn new(config: AuthConfig) -> AuthResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let exchanger = Arc::new(HttpTokenExchanger::new(Arc::clone(&config))?);
        Ok(Self::assemble(config, exchanger, Arc::new(SystemBrowser)))
    }
}

impl<X, B> AuthSession<X, B>
where
    X: TokenExchanger + 'static,
    B: BrowserLauncher + 'static,
{
    /// Session with injected token endpoint and browser hook
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if `config` is incomplete.
    pub fn with_components(config: AuthConfig, exchanger: Arc<X>, browser: Arc<B>) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self::assemble(Arc::new(config), exchanger, browser))
    }

    fn assemble(config: Arc<AuthConfig>, exchanger: Arc<X>, browser: Arc<B>) -> Self {
        Self {
            config,
            store: Arc::new(TokenStore::new()),
            registry: Arc::new(PendingAuthRegistry::new()),
            exchanger,
            browser,
            listener: Mutex::new(None),
            in_flight: Mutex::new(None),
            refresh_lock: Mutex::new(()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Run `operation` once a fresh token is in the store
    ///
    /// # Errors
    /// Any auth failure converted into `E`, or the operation's own error.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AuthError>,
    {
        self.ensure_valid_token().await?;
        operation().await
    }

    /// Like [`Self::execute`], handing the access token to `operation`
    ///
    /// # Errors
    /// Any auth failure converted into `E`, or the operation's own error.
    pub async fn execute_with_token<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AuthError>,
    {
        let token = self.ensure_valid_token().await?;
        operation(token.access_token).await
    }

    /// Fresh bearer token for an outgoing request
    ///
    /// # Errors
    /// Returns the auth failure that prevented obtaining a token.
    pub async fn bearer_token(&self) -> AuthResult<String> {
        Ok(self.ensure_valid_token().await?.access_token)
    }

    /// Ensure a token valid beyond the expiry buffer and return it
    ///
    /// # Errors
    /// - `AuthError::Configuration` if the listener cannot bind
    /// - any failure of the interactive flow
    pub async fn ensure_valid_token(&self) -> AuthResult<Token> {
        self.ensure_listener().await?;

        if let Some(token) = self.store.get().await {
            if !token.is_expiring_soon(self.store.buffer()) {
                debug!("Using cached token");
                return Ok(token);
            }

            match self.refresh_stored_token().await {
                Ok(token) => return Ok(token),
                Err(err) if err.is_refresh_failure() => {
                    warn!(error = %err, "Token refresh failed; falling back to interactive authorization");
                }
                Err(err) => return Err(err),
            }
        }

        self.authorize_interactively().await
    }

    async fn refresh_stored_token(&self) -> AuthResult<Token> {
        let _guard = self.refresh_lock.lock().await;

        // Whoever held the lock before us may have refreshed or cleared it.
        let Some(current) = self.store.get().await else {
            return Err(AuthError::NoRefreshToken);
        };
        if !current.is_expiring_soon(self.store.buffer()) {
            debug!("Token refreshed by a concurrent caller");
            return Ok(current);
        }

        info!(expires_in_secs = current.seconds_until_expiry(), "Refreshing access token");
        match self.exchanger.refresh(&current).await {
            Ok(token) => {
                self.store.set(token.clone()).await;
                Ok(token)
            }
            Err(err) if err.is_refresh_failure() => {
                // Cleared under the lock so queued callers go interactive
                // instead of retrying the same refresh token.
                self.store.clear().await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn authorize_interactively(&self) -> AuthResult<Token> {
        let ticket = match self.join_or_start_attempt().await? {
            Attempt::Ready(token) => return Ok(token),
            Attempt::Waiting(ticket) => ticket,
        };
        let state = ticket.handle.state().to_string();
        let _leave = LeaveOnDrop {
            registry: &self.registry,
            state: state.clone(),
            waiters: ticket.waiters,
        };

        let wait = ticket.handle.wait(None);
        let outcome = match ticket.deadline {
            Some((deadline, limit)) => tokio::time::timeout_at(deadline, wait)
                .await
                .unwrap_or(Err(AuthError::CallbackTimeout(limit))),
            None => wait.await,
        };
        self.finish_attempt(&state, &outcome).await;
        outcome?;

        // The callback handler stores the token before resolving; a logout
        // in between leaves nothing to return.
        self.store.get().await.ok_or(AuthError::Abandoned)
    }

    async fn join_or_start_attempt(&self) -> AuthResult<Attempt> {
        let mut in_flight = self.in_flight.lock().await;

        let joined = in_flight
            .as_ref()
            .filter(|attempt| self.registry.is_pending(attempt.handle.state()))
            .and_then(InFlight::join);
        if let Some(ticket) = joined {
            debug!(state = %redact_state(ticket.handle.state()), "Joining in-flight authorization");
            return Ok(Attempt::Waiting(ticket));
        }

        if let Some(token) = self.store.get().await {
            if !token.is_expiring_soon(self.store.buffer()) {
                return Ok(Attempt::Ready(token));
            }
        }

        let state = generate_state();
        let handle = self.registry.register(&state);
        let url = self.authorization_url(&state);

        if let Err(err) = self.browser.open(&url) {
            self.registry.remove(&state);
            *in_flight = None;
            return Err(err);
        }

        info!(state = %redact_state(&state), "Waiting for OAuth callback");
        let attempt = InFlight {
            handle,
            deadline: self
                .config
                .callback_wait()
                .and_then(|limit| Instant::now().checked_add(limit).map(|at| (at, limit))),
            waiters: Arc::new(AtomicUsize::new(1)),
        };
        let ticket = attempt.ticket();
        *in_flight = Some(attempt);
        Ok(Attempt::Waiting(ticket))
    }

    async fn finish_attempt(&self, state: &str, outcome: &AuthResult<()>) {
        if let Err(AuthError::CallbackTimeout(limit)) = outcome {
            warn!(state = %redact_state(state), ?limit, "OAuth callback never arrived");
            // Every joined caller sees the timeout; late callbacks for this
            // state are answered as unknown.
            self.registry.resolve(state, outcome.clone());
            self.registry.remove(state);
        }

        let mut in_flight = self.in_flight.lock().await;
        if in_flight.as_ref().is_some_and(|attempt| attempt.handle.state() == state) {
            *in_flight = None;
        }
    }

    /// Authorize URL the browser is sent to for `state`
    ///
    /// Every value is percent-encoded; `scope` and `audience` are omitted
    /// when empty.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        let scope = self.config.scope_string();
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.callback_url.as_str()),
        ];
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }
        params.push(("state", state));
        if let Some(audience) = self.config.audience.as_deref().filter(|a| !a.is_empty()) {
            params.push(("audience", audience));
        }

        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{query}", self.config.authorize_endpoint())
    }

    /// Start the callback listener unless it is already running
    ///
    /// # Errors
    /// - `AuthError::Configuration` if the port cannot be bound
    /// - `AuthError::Internal` after [`Self::shutdown`]
    pub async fn ensure_listener(&self) -> AuthResult<SocketAddr> {
        let mut slot = self.listener.lock().await;
        if let Some(listener) = slot.as_ref() {
            return Ok(listener.local_addr());
        }
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(AuthError::Internal("auth session has been shut down".to_string()));
        }

        let listener = CallbackListener::start(self.callback_router(), self.config.callback_port).await?;
        let addr = listener.local_addr();
        *slot = Some(listener);
        Ok(addr)
    }

    /// Release the socket and abandon every pending attempt
    ///
    /// The stored token is left untouched.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if the listener task panicked.
    pub async fn shutdown(&self) -> AuthResult<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        *self.in_flight.lock().await = None;
        let abandoned = self.registry.clear();

        let listener = self.listener.lock().await.take();
        if let Some(listener) = listener {
            listener.shutdown().await?;
        }

        info!(abandoned, "Auth session shut down");
        Ok(())
    }

    /// Forget the stored token
    pub async fn logout(&self) {
        self.store.clear().await;
        info!("Logged out");
    }

    /// Abandon the in-flight interactive attempt
    ///
    /// Its waiters fail with `AuthError::Abandoned` and a late callback is
    /// answered as an unknown state. Returns `false` if nothing was pending.
    pub async fn cancel_pending(&self) -> bool {
        let Some(attempt) = self.in_flight.lock().await.take() else {
            return false;
        };
        let state = attempt.handle.state();
        let removed = self.registry.remove(state);
        if removed {
            info!(state = %redact_state(state), "Pending authorization cancelled");
        }
        removed
    }

    /// True when a token is stored and valid beyond the expiry buffer
    pub async fn is_authenticated(&self) -> bool {
        !self.store.is_expiring_soon().await
    }

    pub async fn has_pending_authorization(&self) -> bool {
        self.in_flight
            .lock()
            .await
            .as_ref()
            .is_some_and(|attempt| self.registry.is_pending(attempt.handle.state()))
    }

    pub async fn seconds_until_expiry(&self) -> Option<i64> {
        self.store.seconds_until_expiry().await
    }

    /// Bound listener address, `None` before the first start
    pub async fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().await.as_ref().map(CallbackListener::local_addr)
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<PendingAuthRegistry> {
        &self.registry
    }

    /// Callback routes over this session's state, without a socket
    pub fn callback_router(&self) -> Router {
        callback_router(CallbackContext {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            exchanger: Arc::clone(&self.exchanger),
        })
    }
}

impl<X, B> std::fmt::Debug for AuthSession<X, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
