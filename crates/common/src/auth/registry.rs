//! Pending authorization attempts keyed by state nonce
//!
//! Each attempt owns a `watch` sender that is written at most once. Waiters
//! hold receivers through a clonable [`CompletionHandle`], so any number of
//! callers can share the outcome of one browser flow. Removing an entry
//! drops its sender and wakes every waiter with [`AuthError::Abandoned`].
//!
//! The callback side goes through [`PendingAuthRegistry::claim`]: at most one
//! [`Claim`] is ever handed out per state, and dropping it removes the entry.

use std::collections::HashMap;
use std::time::Duration;

use authloop_domain::{AuthError, AuthResult};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use super::state::redact_state;

type Outcome = Option<AuthResult<()>>;

struct PendingAttempt {
    // `None` once resolved; the entry stays until `remove`.
    sender: Option<watch::Sender<Outcome>>,
    claimed: bool,
    // Keeps the channel alive after resolution so late subscribers still
    // observe the outcome.
    receiver: watch::Receiver<Outcome>,
}

/// Registry of in-flight interactive authorizations
#[derive(Default)]
pub struct PendingAuthRegistry {
    attempts: Mutex<HashMap<String, PendingAttempt>>,
}

impl PendingAuthRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `state` and return the handle its callers wait on
    ///
    /// Registering a state that is already present returns a handle onto
    /// the existing attempt instead of replacing it.
    pub fn register(&self, state: &str) -> CompletionHandle {
        let mut attempts = self.attempts.lock();
        let attempt = attempts.entry(state.to_string()).or_insert_with(|| {
            let (sender, receiver) = watch::channel(None);
            debug!(state = %redact_state(state), "Registered pending authorization");
            PendingAttempt { sender: Some(sender), claimed: false, receiver }
        });
        CompletionHandle { state: state.to_string(), receiver: attempt.receiver.clone() }
    }

    /// Handle onto an existing attempt, `None` when `state` is unknown
    pub fn subscribe(&self, state: &str) -> Option<CompletionHandle> {
        self.attempts.lock().get(state).map(|attempt| CompletionHandle {
            state: state.to_string(),
            receiver: attempt.receiver.clone(),
        })
    }

    /// Take exclusive ownership of an unresolved `state`
    ///
    /// Returns `None` when the state is unknown, already resolved or already
    /// claimed. The attempt stays pending for its waiters until the claim is
    /// resolved; dropping the claim removes the entry.
    pub fn claim(&self, state: &str) -> Option<Claim<'_>> {
        let mut attempts = self.attempts.lock();
        let attempt = attempts.get_mut(state).filter(|a| a.sender.is_some() && !a.claimed)?;
        attempt.claimed = true;
        debug!(state = %redact_state(state), "Claimed pending authorization");
        Some(Claim { registry: self, state: state.to_string() })
    }

    /// Deliver the single outcome for `state`
    ///
    /// Returns `false` when the state is unknown or was already resolved; a
    /// second resolution never overwrites the first.
    pub fn resolve(&self, state: &str, outcome: AuthResult<()>) -> bool {
        let mut attempts = self.attempts.lock();
        let Some(sender) = attempts.get_mut(state).and_then(|attempt| attempt.sender.take()) else {
            return false;
        };
        debug!(state = %redact_state(state), success = outcome.is_ok(), "Resolved pending authorization");
        // send_replace never fails even if every receiver is gone
        sender.send_replace(Some(outcome));
        true
    }

    /// Forget `state`; unresolved waiters observe `Abandoned`
    pub fn remove(&self, state: &str) -> bool {
        self.attempts.lock().remove(state).is_some()
    }

    pub fn contains(&self, state: &str) -> bool {
        self.attempts.lock().contains_key(state)
    }

    /// True while `state` is registered and has not been resolved yet
    pub fn is_pending(&self, state: &str) -> bool {
        self.attempts.lock().get(state).is_some_and(|attempt| attempt.sender.is_some())
    }

    pub fn len(&self) -> usize {
        self.attempts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.lock().is_empty()
    }

    /// Abandon every attempt (session shutdown)
    pub fn clear(&self) -> usize {
        let mut attempts = self.attempts.lock();
        let count = attempts.len();
        attempts.clear();
        count
    }
}

impl std::fmt::Debug for PendingAuthRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAuthRegistry").field("pending", &self.len()).finish()
    }
}

/// Exclusive right to complete one pending attempt
///
/// Obtained from [`PendingAuthRegistry::claim`]. The entry is removed when
/// the claim goes away, on every exit path of its holder.
pub struct Claim<'a> {
    registry: &'a PendingAuthRegistry,
    state: String,
}

impl Claim<'_> {
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Deliver the outcome and release the entry
    pub fn resolve(self, outcome: AuthResult<()>) -> bool {
        self.registry.resolve(&self.state, outcome)
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if self.registry.remove(&self.state) {
            debug!(state = %redact_state(&self.state), "Pending authorization removed");
        }
    }
}

impl std::fmt::Debug for Claim<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Claim").field("state", &redact_state(&self.state)).finish()
    }
}

/// Waitable view of one pending attempt
#[derive(Clone)]
pub struct CompletionHandle {
    state: String,
    receiver: watch::Receiver<Outcome>,
}

impl CompletionHandle {
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Suspend until the attempt is resolved
    ///
    /// `timeout = None` waits indefinitely.
    ///
    /// # Errors
    /// - The resolved failure, if the callback reported one
    /// - `AuthError::Abandoned` if the attempt was removed unresolved
    /// - `AuthError::CallbackTimeout` if `timeout` elapsed first
    pub async fn wait(mut self, timeout: Option<Duration>) -> AuthResult<()> {
        let wait = async {
            match self.receiver.wait_for(Option::is_some).await {
                Ok(outcome) => outcome.clone().unwrap_or(Err(AuthError::Abandoned)),
                Err(_) => Err(AuthError::Abandoned),
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .unwrap_or(Err(AuthError::CallbackTimeout(limit))),
            None => wait.await,
        }
    }
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle").field("state", &redact_state(&self.state)).finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::registry.
    use super::*;

    const WAIT: Option<Duration> = Some(Duration::from_secs(2));

    #[tokio::test]
    async fn test_resolve_success_wakes_waiter() {
        let registry = PendingAuthRegistry::new();
        let handle = registry.register("s1");

        assert!(registry.resolve("s1", Ok(())));
        assert_eq!(handle.wait(WAIT).await, Ok(()));
    }

    #[tokio::test]
    async fn test_resolve_failure_is_delivered() {
        let registry = PendingAuthRegistry::new();
        let handle = registry.register("s1");

        registry.resolve("s1", Err(AuthError::AuthorizationDenied("access_denied".into())));

        assert_eq!(
            handle.wait(WAIT).await,
            Err(AuthError::AuthorizationDenied("access_denied".into()))
        );
    }

    /// Validates the single-resolution rule.
    ///
    /// Assertions:
    /// - The first `resolve` returns true, the second false.
    /// - Waiters observe the first outcome.
    #[tokio::test]
    async fn test_second_resolution_is_rejected() {
        let registry = PendingAuthRegistry::new();
        let handle = registry.register("s1");

        assert!(registry.resolve("s1", Ok(())));
        assert!(!registry.resolve("s1", Err(AuthError::Abandoned)));
        assert!(!registry.is_pending("s1"));
        assert_eq!(handle.wait(WAIT).await, Ok(()));
    }

    #[tokio::test]
    async fn test_unknown_state_is_not_resolved() {
        let registry = PendingAuthRegistry::new();
        assert!(!registry.resolve("zzz", Ok(())));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_remove_abandons_waiters() {
        let registry = PendingAuthRegistry::new();
        let handle = registry.register("s1");

        assert!(registry.remove("s1"));
        assert!(!registry.remove("s1"));
        assert_eq!(handle.wait(WAIT).await, Err(AuthError::Abandoned));
    }

    #[tokio::test]
    async fn test_resolved_outcome_survives_removal() {
        let registry = PendingAuthRegistry::new();
        let handle = registry.register("s1");

        registry.resolve("s1", Ok(()));
        registry.remove("s1");

        assert_eq!(handle.wait(WAIT).await, Ok(()));
    }

    /// Validates fan-out of one outcome to several waiters.
    ///
    /// Assertions:
    /// - Every cloned handle and late subscriber sees the same result.
    #[tokio::test]
    async fn test_outcome_fans_out_to_all_waiters() {
        let registry = PendingAuthRegistry::new();
        let first = registry.register("s1");
        let second = first.clone();
        let third = registry.register("s1");
        assert_eq!(registry.len(), 1);

        let waiters = tokio::spawn(async move {
            let (a, b, c) = tokio::join!(first.wait(WAIT), second.wait(WAIT), third.wait(WAIT));
            (a, b, c)
        });

        tokio::task::yield_now().await;
        registry.resolve("s1", Ok(()));

        let (a, b, c) = waiters.await.unwrap();
        assert_eq!((a, b, c), (Ok(()), Ok(()), Ok(())));

        let late = registry.subscribe("s1").unwrap();
        assert_eq!(late.wait(WAIT).await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let registry = PendingAuthRegistry::new();
        let handle = registry.register("s1");

        let result = handle.wait(Some(Duration::from_secs(30))).await;

        assert_eq!(result, Err(AuthError::CallbackTimeout(Duration::from_secs(30))));
        assert!(registry.is_pending("s1"));
    }

    /// Validates that a state can be claimed only once.
    ///
    /// Assertions:
    /// - A second claim on the same state is refused while the first is held.
    /// - The claimed attempt stays pending until resolved.
    /// - Dropping the claim removes the entry; waiters keep the outcome.
    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let registry = PendingAuthRegistry::new();
        let handle = registry.register("s1");

        let claim = registry.claim("s1").unwrap();
        assert!(registry.claim("s1").is_none());
        assert!(registry.is_pending("s1"));

        assert!(claim.resolve(Ok(())));
        assert!(!registry.contains("s1"));
        assert!(registry.claim("s1").is_none());
        assert_eq!(handle.wait(WAIT).await, Ok(()));
    }

    #[tokio::test]
    async fn test_unresolved_claim_abandons_on_drop() {
        let registry = PendingAuthRegistry::new();
        let handle = registry.register("s1");

        drop(registry.claim("s1"));

        assert!(registry.is_empty());
        assert_eq!(handle.wait(WAIT).await, Err(AuthError::Abandoned));
    }

    #[test]
    fn test_claim_refuses_unknown_and_resolved_states() {
        let registry = PendingAuthRegistry::new();
        registry.register("s1");
        registry.resolve("s1", Ok(()));

        assert!(registry.claim("s1").is_none());
        assert!(registry.claim("zzz").is_none());
    }

    #[tokio::test]
    async fn test_clear_abandons_everything() {
        let registry = PendingAuthRegistry::new();
        let a = registry.register("a");
        let b = registry.register("b");

        assert_eq!(registry.clear(), 2);
        assert_eq!(a.wait(WAIT).await, Err(AuthError::Abandoned));
        assert_eq!(b.wait(WAIT).await, Err(AuthError::Abandoned));
    }
}
