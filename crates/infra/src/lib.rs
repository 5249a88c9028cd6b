//! # Authloop Infrastructure
//!
//! Process-edge concerns around the auth core:
//! - **config**: `AuthConfig` loading from environment variables or files
//! - **observability**: tracing subscriber installation

pub mod config;
pub mod observability;

pub use config::{load, load_from_env, load_from_file, probe_config_paths};
pub use observability::{init_tracing, LogFormat};
