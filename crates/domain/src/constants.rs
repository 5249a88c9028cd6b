//! Protocol constants
//!
//! Centralized location for the fixed values of the authorization-code flow.

// Token lifetime policy
pub const EXPIRY_BUFFER_SECS: i64 = 300;
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

// Callback listener routes
pub const HEALTH_PATH: &str = "/health";
pub const CALLBACK_PATH: &str = "/oauth/callback";

// Timeouts
pub const DEFAULT_CALLBACK_WAIT_SECS: u64 = 300;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

// Log redaction: how many characters of a state nonce may appear in logs
pub const STATE_LOG_PREFIX_LEN: usize = 8;
