//! State nonce generation for CSRF protection
//!
//! The callback handler trusts `state` as the only correlation key back to a
//! waiting caller, so it has to be unguessable.

use authloop_domain::constants::STATE_LOG_PREFIX_LEN;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Generate a random state token
///
/// Returns a URL-safe base64-encoded random string of 32 bytes (43
/// characters).
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Shortened form of a state value that is safe to log
#[must_use]
pub fn redact_state(state: &str) -> String {
    let prefix: String = state.chars().take(STATE_LOG_PREFIX_LEN).collect();
    format!("{prefix}…")
}
