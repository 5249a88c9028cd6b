//! Configuration loader
//!
//! Loads the provider configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Every configuration returned by this module has passed
//! [`AuthConfig::validate`].
//!
//! ## Environment Variables
//! - `AUTHLOOP_CLIENT_ID`, `AUTHLOOP_CLIENT_SECRET`: client credentials
//! - `AUTHLOOP_TOKEN_HOST`: provider origin
//! - `AUTHLOOP_AUTHORIZE_PATH`, `AUTHLOOP_TOKEN_PATH`: endpoint paths
//! - `AUTHLOOP_AUTHORIZATION_METHOD`: `body` or `header`
//! - `AUTHLOOP_AUDIENCE`: optional audience parameter
//! - `AUTHLOOP_CALLBACK_URL`: redirect URI registered with the provider
//! - `AUTHLOOP_CALLBACK_PORT`: loopback port for the callback listener
//! - `AUTHLOOP_SCOPES`: space or comma separated scopes
//! - `AUTHLOOP_CALLBACK_TIMEOUT_SECS`: optional, `0` waits forever
//! - `AUTHLOOP_HTTP_TIMEOUT_SECS`: optional token endpoint timeout
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./authloop.toml` or `./authloop.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};

use authloop_domain::{AuthConfig, AuthError, AuthResult, AuthTimeouts, AuthorizationMethod};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["authloop.toml", "authloop.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `AuthError::Configuration` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> AuthResult<AuthConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `AuthError::Configuration` if required variables are missing,
/// have invalid values, or the result fails validation.
pub fn load_from_env() -> AuthResult<AuthConfig> {
    let authorization_method = env_var("AUTHLOOP_AUTHORIZATION_METHOD")?
        .parse::<AuthorizationMethod>()
        .map_err(AuthError::Configuration)?;

    let callback_port = env_var("AUTHLOOP_CALLBACK_PORT")?
        .trim()
        .parse::<u16>()
        .map_err(|e| AuthError::Configuration(format!("Invalid callback port: {}", e)))?;

    let defaults = AuthTimeouts::default();
    let timeouts = AuthTimeouts {
        callback_wait_secs: env_u64("AUTHLOOP_CALLBACK_TIMEOUT_SECS")?
            .unwrap_or(defaults.callback_wait_secs),
        http_request_secs: env_u64("AUTHLOOP_HTTP_TIMEOUT_SECS")?
            .unwrap_or(defaults.http_request_secs),
    };

    let config = AuthConfig {
        client_id: env_var("AUTHLOOP_CLIENT_ID")?,
        client_secret: env_var("AUTHLOOP_CLIENT_SECRET")?,
        token_host: env_var("AUTHLOOP_TOKEN_HOST")?,
        authorize_path: env_var("AUTHLOOP_AUTHORIZE_PATH")?,
        token_path: env_var("AUTHLOOP_TOKEN_PATH")?,
        authorization_method,
        audience: std::env::var("AUTHLOOP_AUDIENCE").ok().filter(|a| !a.trim().is_empty()),
        callback_url: env_var("AUTHLOOP_CALLBACK_URL")?,
        callback_port,
        scopes: split_scopes(&env_var("AUTHLOOP_SCOPES")?),
        timeouts,
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `AuthError::Configuration` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or validation fails
pub fn load_from_file(path: Option<PathBuf>) -> AuthResult<AuthConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AuthError::Configuration(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AuthError::Configuration(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| AuthError::Configuration(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> AuthResult<AuthConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AuthError::Configuration(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AuthError::Configuration(format!("Invalid JSON format: {}", e))),
        _ => Err(AuthError::Configuration(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe standard locations for a configuration file
///
/// Searches the current working directory, then the executable's
/// directory, for `authloop.{toml,json}` and `config.{toml,json}`.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Scopes from a space or comma separated list
fn split_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Get required environment variable
///
/// # Errors
/// Returns `AuthError::Configuration` if the variable is not set.
fn env_var(key: &str) -> AuthResult<String> {
    std::env::var(key).map_err(|_| {
        AuthError::Configuration(format!("Missing required environment variable: {}", key))
    })
}

/// Optional numeric environment variable
fn env_u64(key: &str) -> AuthResult<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| AuthError::Configuration(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}
