//! Testing utilities and helpers
//!
//! - **[`mocks`]**: scripted [`TokenExchanger`](crate::auth::TokenExchanger)
//!   and recording [`BrowserLauncher`](crate::auth::BrowserLauncher)
//! - **[`fixtures`]**: ready-made configuration and tokens
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use authloop_common::auth::AuthSession;
//! use authloop_common::testing::{test_config, MockTokenExchanger, RecordingBrowser};
//!
//! let exchanger = Arc::new(MockTokenExchanger::new());
//! let browser = Arc::new(RecordingBrowser::new());
//! let session = AuthSession::with_components(test_config(), exchanger, browser).unwrap();
//! assert!(session.registry().is_empty());
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::{test_config, token_expiring_in};
pub use mocks::{state_from_url, MockTokenExchanger, RecordingBrowser};
