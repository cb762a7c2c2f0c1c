//! Cancel tokens.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::coalesce::RequestCoalescer;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Why a token was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller cancelled explicitly.
    Requested,
    /// A supervising timeout elapsed.
    Timeout,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Requested => write!(f, "requested"),
            CancelReason::Timeout => write!(f, "timeout"),
        }
    }
}

/// Coalescer identity (its allocation address) plus cache key.
type RegistrationId = (usize, String);

struct Registration {
    coalescer: Weak<RequestCoalescer>,
    holders: usize,
}

struct TokenState {
    id: u64,
    signal: CancellationToken,
    reason: Mutex<Option<CancelReason>>,
    registrations: Mutex<HashMap<RegistrationId, Registration>>,
    governors: AtomicUsize,
}

/// Handle marking a logical operation as aborted.
///
/// Cloning is cheap; clones share state, so cancelling any clone cancels
/// them all. The first cancellation's reason sticks.
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<TokenState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new(TokenState {
                id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
                signal: CancellationToken::new(),
                reason: Mutex::new(None),
                registrations: Mutex::new(HashMap::new()),
                governors: AtomicUsize::new(0),
            }),
        }
    }

    /// Process-unique identifier, used as the owner of in-flight keys.
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Cancels with [`CancelReason::Requested`].
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::Requested);
    }

    /// Cancels with `reason`, releasing every registered in-flight key.
    ///
    /// Cancelling an already-cancelled token is a no-op.
    pub fn cancel_with(&self, reason: CancelReason) {
        {
            let mut current = self.state.reason.lock();
            if current.is_some() {
                return;
            }
            *current = Some(reason);
        }

        let registrations = mem::take(&mut *self.state.registrations.lock());
        debug!(
            token = self.state.id,
            reason = %reason,
            keys = registrations.len(),
            "Cancel token fired"
        );
        for ((_, key), registration) in registrations {
            if let Some(coalescer) = registration.coalescer.upgrade() {
                coalescer.release_owned(&key, self.state.id);
            }
        }

        self.state.signal.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.signal.is_cancelled()
    }

    /// The reason this token was cancelled, if it was.
    pub fn reason(&self) -> Option<CancelReason> {
        *self.state.reason.lock()
    }

    /// Completes when the token is cancelled.
    pub async fn cancelled(&self) {
        self.state.signal.cancelled().await
    }

    /// Registers `key` in `coalescer` as owned by this token until the
    /// returned handle is dropped.
    ///
    /// Concurrent registrations of the same key share one entry. Nothing is
    /// recorded once the token is cancelled.
    pub(crate) fn register(&self, coalescer: &Arc<RequestCoalescer>, key: &str) -> KeyRegistration {
        let id = (Arc::as_ptr(coalescer) as usize, key.to_string());
        {
            let mut registrations = self.state.registrations.lock();
            // Checked under the registrations lock so a concurrent cancel
            // either sees this entry or we see its reason.
            if self.state.reason.lock().is_none() {
                registrations
                    .entry(id.clone())
                    .or_insert_with(|| Registration {
                        coalescer: Arc::downgrade(coalescer),
                        holders: 0,
                    })
                    .holders += 1;
            }
        }
        KeyRegistration {
            token: self.clone(),
            id,
        }
    }

    fn unregister(&self, id: &RegistrationId) {
        let mut registrations = self.state.registrations.lock();
        if let Some(registration) = registrations.get_mut(id) {
            registration.holders -= 1;
            if registration.holders == 0 {
                registrations.remove(id);
            }
        }
    }

    /// Number of distinct keys currently registered against this token.
    pub fn registered_keys(&self) -> usize {
        self.state.registrations.lock().len()
    }

    pub(crate) fn govern(&self) {
        self.state.governors.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release_governance(&self) {
        self.state.governors.fetch_sub(1, Ordering::AcqRel);
    }

    /// Returns `true` while at least one supervisor's timeout governs this token.
    pub fn is_governed(&self) -> bool {
        self.state.governors.load(Ordering::Acquire) > 0
    }
}

/// Keeps a key registered against a token; unregisters it on drop.
pub(crate) struct KeyRegistration {
    token: CancelToken,
    id: RegistrationId,
}

impl Drop for KeyRegistration {
    fn drop(&mut self) {
        self.token.unregister(&self.id);
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("id", &self.state.id)
            .field("reason", &self.reason())
            .field("governed", &self.is_governed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_reason_display() {
        assert_eq!(CancelReason::Requested.to_string(), "requested");
        assert_eq!(CancelReason::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = CancelToken::new();
        let b = CancelToken::default();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn test_first_reason_wins() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);

        token.cancel_with(CancelReason::Timeout);
        token.cancel();

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancelReason::Timeout));
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancelReason::Requested));
    }

    #[tokio::test]
    async fn test_cancelled_future_completes() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should complete")
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_dedupes_and_cancel_drains() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let token = CancelToken::new();

        let _guard = coalescer.acquire("k", Some(&token)).await;
        let _extra = token.register(&coalescer, "k");
        assert_eq!(token.registered_keys(), 1);

        token.cancel();
        assert_eq!(token.registered_keys(), 0);
        assert!(!coalescer.is_in_flight("k"));

        // Registering after cancellation is ignored.
        let _late = token.register(&coalescer, "late");
        assert_eq!(token.registered_keys(), 0);
    }

    #[test]
    fn test_registration_lives_until_last_holder_drops() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let token = CancelToken::new();

        let first = token.register(&coalescer, "k");
        let second = token.register(&coalescer, "k");
        let other = token.register(&coalescer, "j");
        assert_eq!(token.registered_keys(), 2);

        drop(first);
        assert_eq!(token.registered_keys(), 2);
        drop(second);
        assert_eq!(token.registered_keys(), 1);
        drop(other);
        assert_eq!(token.registered_keys(), 0);
    }

    #[tokio::test]
    async fn test_settled_requests_do_not_accumulate_registrations() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let token = CancelToken::new();

        for i in 0..1000 {
            let guard = coalescer.acquire(&format!("tile-{}", i), Some(&token)).await;
            drop(guard);
        }

        assert_eq!(token.registered_keys(), 0);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[test]
    fn test_governance_counts_supervisors() {
        let token = CancelToken::new();
        assert!(!token.is_governed());
        token.govern();
        token.govern();
        token.release_governance();
        assert!(token.is_governed());
        token.release_governance();
        assert!(!token.is_governed());
    }
}
