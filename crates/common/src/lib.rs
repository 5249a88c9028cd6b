//! OAuth credential lifecycle for authloop.
//!
//! - [`auth`]: token store, pending-attempt registry, loopback callback
//!   listener, token endpoint client and the [`AuthSession`] orchestrator
//! - [`testing`]: mocks and fixtures for the auth seams

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;

// Testing utilities
// ---------------------------------------------------------------
pub mod testing;

pub use auth::{AuthSession, Token, TokenStore};
pub use authloop_domain::{AuthConfig, AuthError, AuthResult};
