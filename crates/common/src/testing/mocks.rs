//! Mock implementations of the auth seams
//!
//! Both mocks count their calls so tests can assert how often the network or
//! the browser would have been touched.

// Test doubles: errors are scripted, panics indicate a broken test.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use authloop_domain::{AuthError, AuthResult};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::fixtures::token_expiring_in;
use crate::auth::{BrowserLauncher, Token, TokenExchanger};

/// Scripted token endpoint
///
/// By default every exchange yields `mock-access`/`mock-refresh` valid for an
/// hour and every refresh yields `mock-refreshed` keeping the old refresh
/// token.
#[derive(Debug, Default)]
pub struct MockTokenExchanger {
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    exchange_result: Mutex<Option<AuthResult<Token>>>,
    refresh_result: Mutex<Option<AuthResult<Token>>>,
    last_code: Mutex<Option<String>>,
    exchange_delay: Mutex<Option<Duration>>,
}

impl MockTokenExchanger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed_exchange(&self, token: Token) {
        *self.exchange_result.lock() = Some(Ok(token));
    }

    pub fn fail_exchange(&self, error: AuthError) {
        *self.exchange_result.lock() = Some(Err(error));
    }

    /// Make every exchange take `delay` before answering
    pub fn delay_exchange(&self, delay: Duration) {
        *self.exchange_delay.lock() = Some(delay);
    }

    pub fn succeed_refresh(&self, token: Token) {
        *self.refresh_result.lock() = Some(Ok(token));
    }

    pub fn fail_refresh(&self, error: AuthError) {
        *self.refresh_result.lock() = Some(Err(error));
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Most recent authorization code passed to `exchange_code`
    pub fn last_code(&self) -> Option<String> {
        self.last_code.lock().clone()
    }
}

#[async_trait]
impl TokenExchanger for MockTokenExchanger {
    async fn exchange_code(&self, code: &str) -> AuthResult<Token> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_code.lock() = Some(code.to_string());
        let delay = *self.exchange_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.exchange_result
            .lock()
            .clone()
            .unwrap_or_else(|| Ok(token_expiring_in("mock-access", Some("mock-refresh"), 3600)))
    }

    async fn refresh(&self, current: &Token) -> AuthResult<Token> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let Some(refresh_token) = current.refresh_token.as_deref() else {
            return Err(AuthError::NoRefreshToken);
        };
        self.refresh_result
            .lock()
            .clone()
            .unwrap_or_else(|| Ok(token_expiring_in("mock-refreshed", Some(refresh_token), 3600)))
    }
}

/// Browser hook that records URLs instead of opening them
///
/// Every opened URL is also sent on a channel so a test can play the
/// provider and deliver the redirect.
#[derive(Debug)]
pub struct RecordingBrowser {
    opened: Mutex<Vec<String>>,
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    failure: Mutex<Option<AuthError>>,
}

impl RecordingBrowser {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { opened: Mutex::new(Vec::new()), tx, rx: Mutex::new(Some(rx)), failure: Mutex::new(None) }
    }

    /// Receiver of opened URLs; `None` after the first call
    pub fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.rx.lock().take()
    }

    /// Make subsequent `open` calls fail with `error`
    pub fn fail_with(&self, error: AuthError) {
        *self.failure.lock() = Some(error);
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }
}

impl Default for RecordingBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserLauncher for RecordingBrowser {
    fn open(&self, url: &str) -> AuthResult<()> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        self.opened.lock().push(url.to_string());
        let _ = self.tx.send(url.to_string());
        Ok(())
    }
}

/// Decoded `state` query parameter of an authorization URL
#[must_use]
pub fn state_from_url(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "state")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
}

#[cfg(test)]
mod tests {
    //! Unit tests for testing::mocks.
    use super::*;

    #[tokio::test]
    async fn test_mock_exchanger_defaults_and_counts() {
        let mock = MockTokenExchanger::new();

        let token = mock.exchange_code("c1").await.unwrap();
        let refreshed = mock.refresh(&token).await.unwrap();

        assert_eq!(token.access_token, "mock-access");
        assert_eq!(refreshed.access_token, "mock-refreshed");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("mock-refresh"));
        assert_eq!((mock.exchange_calls(), mock.refresh_calls()), (1, 1));
        assert_eq!(mock.last_code().as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_mock_refresh_without_refresh_token() {
        let mock = MockTokenExchanger::new();
        let token = token_expiring_in("a", None, 10);

        assert_eq!(mock.refresh(&token).await, Err(AuthError::NoRefreshToken));
    }

    #[test]
    fn test_recording_browser_forwards_urls() {
        let browser = RecordingBrowser::new();
        let mut rx = browser.take_receiver().unwrap();

        browser.open("https://idp.test/authorize?state=abc").unwrap();

        assert_eq!(browser.open_count(), 1);
        assert_eq!(rx.try_recv().unwrap(), "https://idp.test/authorize?state=abc");
        assert!(browser.take_receiver().is_none());
    }

    #[test]
    fn test_state_from_url() {
        assert_eq!(
            state_from_url("https://idp.test/a?client_id=x&state=ab%2Dc&scope=s").as_deref(),
            Some("ab-c")
        );
        assert_eq!(state_from_url("https://idp.test/a?client_id=x"), None);
        assert_eq!(state_from_url("https://idp.test/a"), None);
    }
}
