//! Default browser hook

use authloop_domain::{AuthError, AuthResult};
use tracing::info;

use super::traits::BrowserLauncher;

/// Opens URLs in the user's default browser via the `open` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> AuthResult<()> {
        info!("Opening browser for OAuth authorization");
        open::that(url).map_err(|e| AuthError::Browser(e.to_string()))
    }
}
