//! # Authloop Domain
//!
//! Domain types shared by every authloop crate.
//!
//! This crate contains:
//! - Provider configuration (`AuthConfig`, `AuthorizationMethod`)
//! - The auth error taxonomy and Result alias
//! - Protocol constants (expiry buffer, callback routes)
//!
//! ## Architecture
//! - No dependencies on other authloop crates
//! - Only external dependencies allowed
//! - Pure data structures and validation

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
