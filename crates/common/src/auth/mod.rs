//! OAuth 2.0 authorization-code credential lifecycle
//!
//! Obtains a token through the browser once, keeps it in memory, refreshes
//! it before it expires, and falls back to the browser when refresh fails.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   AuthSession   │  Orchestrator (execute / bearer_token)
//! └────────┬────────┘
//!          │
//!          ├──► TokenStore           (current token + 5 min expiry buffer)
//!          ├──► PendingAuthRegistry  (state nonce → completion handle)
//!          ├──► CallbackListener     (127.0.0.1 /health, /oauth/callback)
//!          ├──► TokenExchanger       (code + refresh grants, HTTP)
//!          └──► BrowserLauncher      (opens the authorize URL)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use authloop_common::auth::AuthSession;
//! use authloop_domain::{AuthConfig, AuthError};
//!
//! # async fn run(config: AuthConfig) -> Result<(), AuthError> {
//! let session = AuthSession::new(config)?;
//!
//! // Opens the browser on first use, refreshes transparently afterwards.
//! let bearer = session.bearer_token().await?;
//! println!("Authorization: Bearer {bearer}");
//!
//! session.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod callback;
pub mod exchanger;
pub mod registry;
pub mod session;
pub mod state;
pub mod token_store;
pub mod traits;
pub mod types;

pub use browser::SystemBrowser;
pub use callback::{callback_router, CallbackContext, CallbackListener};
pub use exchanger::HttpTokenExchanger;
pub use registry::{Claim, CompletionHandle, PendingAuthRegistry};
pub use session::AuthSession;
pub use state::{generate_state, redact_state};
pub use token_store::TokenStore;
pub use traits::{BrowserLauncher, TokenExchanger};
pub use types::{CallbackParams, ProviderError, Token, TokenResponse};
