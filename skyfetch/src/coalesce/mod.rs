//! Request coalescing.
//!
//! The [`RequestCoalescer`] tracks cache keys that are currently being
//! fetched. A request that finds its key in flight waits on that key's wait
//! list until the holder releases it, then re-checks the cache instead of
//! going to the network.
//!
//! ```text
//! A ── acquire(k) ──► miss ──► network ──► cache write ──► release(k) ─┐
//! B ── acquire(k) ──► wait ─────────────────────────────────────────────┴─► acquire(k) ──► hit ──► release(k)
//! ```
//!
//! Release is tied to [`InFlightGuard`]'s `Drop`, so a key is released on
//! every path: success, error, panic, or the request future being dropped
//! on cancellation. A cancel token can also release the keys it owns
//! directly, see [`CancelToken::cancel`].
//!
//! [`CancelToken::cancel`]: crate::cancel::CancelToken::cancel

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::cancel::{CancelToken, KeyRegistration};

struct InFlight {
    ticket: u64,
    owner: Option<u64>,
    waiters: Arc<Notify>,
}

/// Registry of cache keys awaiting their first response.
#[derive(Default)]
pub struct RequestCoalescer {
    in_flight: Mutex<HashMap<String, InFlight>>,
    next_ticket: AtomicU64,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key`, waiting while another request holds it.
    ///
    /// If `owner` is given, the key is registered against that token before
    /// waiting so that cancelling the token releases it. The registration
    /// ends with the returned guard, or with this future if it is dropped
    /// while waiting.
    pub async fn acquire(self: &Arc<Self>, key: &str, owner: Option<&CancelToken>) -> InFlightGuard {
        let registration = owner.map(|token| token.register(self, key));
        let owner_id = owner.map(CancelToken::id);
        let mut waited = false;

        loop {
            let waiters = match self.try_claim(key, owner_id) {
                Ok(ticket) => {
                    return InFlightGuard {
                        coalescer: Arc::clone(self),
                        key: key.to_string(),
                        ticket,
                        waited,
                        _registration: registration,
                    };
                }
                Err(waiters) => waiters,
            };

            if !waited {
                debug!(key = %key, "Request coalesced - waiting for in-flight request");
            }
            waited = true;

            // Register before re-checking so a release in between is not missed.
            let notified = waiters.notified();
            if !self.is_held_by(key, &waiters) {
                continue;
            }
            notified.await;
        }
    }

    /// Check-then-insert in one critical section.
    fn try_claim(&self, key: &str, owner: Option<u64>) -> Result<u64, Arc<Notify>> {
        let mut in_flight = self.in_flight.lock();
        match in_flight.entry(key.to_string()) {
            Entry::Occupied(held) => Err(Arc::clone(&held.get().waiters)),
            Entry::Vacant(slot) => {
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                slot.insert(InFlight {
                    ticket,
                    owner,
                    waiters: Arc::new(Notify::new()),
                });
                Ok(ticket)
            }
        }
    }

    fn is_held_by(&self, key: &str, waiters: &Arc<Notify>) -> bool {
        self.in_flight
            .lock()
            .get(key)
            .is_some_and(|held| Arc::ptr_eq(&held.waiters, waiters))
    }

    fn release_where(&self, key: &str, matches: impl Fn(&InFlight) -> bool) -> bool {
        let mut in_flight = self.in_flight.lock();
        match in_flight.get(key) {
            Some(held) if matches(held) => {
                if let Some(held) = in_flight.remove(key) {
                    held.waiters.notify_waiters();
                }
                true
            }
            _ => false,
        }
    }

    fn release_ticket(&self, key: &str, ticket: u64) -> bool {
        self.release_where(key, |held| held.ticket == ticket)
    }

    /// Releases `key` if it is held on behalf of the token with id `owner`.
    pub(crate) fn release_owned(&self, key: &str, owner: u64) -> bool {
        let released = self.release_where(key, |held| held.owner == Some(owner));
        if released {
            debug!(key = %key, token = owner, "Released in-flight key on cancellation");
        }
        released
    }

    /// Returns `true` if `key` is currently in flight.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.lock().contains_key(key)
    }

    /// Number of keys currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

/// Holds a key in the in-flight set; releases it when dropped.
pub struct InFlightGuard {
    coalescer: Arc<RequestCoalescer>,
    key: String,
    ticket: u64,
    waited: bool,
    _registration: Option<KeyRegistration>,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` if this request had to wait for another holder.
    pub fn waited(&self) -> bool {
        self.waited
    }

    /// Releases the key now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.coalescer.release_ticket(&self.key, self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let coalescer = Arc::new(RequestCoalescer::new());

        let guard = coalescer.acquire("k", None).await;
        assert!(coalescer.is_in_flight("k"));
        assert!(!guard.waited());
        assert_eq!(guard.key(), "k");

        guard.release();
        assert!(!coalescer.is_in_flight("k"));
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let _a = coalescer.acquire("a", None).await;
        let _b = coalescer.acquire("b", None).await;
        assert_eq!(coalescer.in_flight_count(), 2);
    }

    #[tokio::test]
    async fn test_waiter_released_when_holder_drops() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let holder = coalescer.acquire("k", None).await;

        let waiter = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move {
                let guard = coalescer.acquire("k", None).await;
                guard.waited()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // Dropping without a write models a failed request.
        drop(holder);

        let waited = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be released promptly")
            .unwrap();
        assert!(waited);
        assert!(!coalescer.is_in_flight("k"));
    }

    #[tokio::test]
    async fn test_only_one_holder_at_a_time() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let active = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::new();

        for _ in 0..20 {
            let coalescer = Arc::clone(&coalescer);
            let active = Arc::clone(&active);
            handles.push(tokio::spawn(async move {
                let _guard = coalescer.acquire("same", None).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                assert_eq!(now, 1, "two holders of the same key");
                tokio::time::sleep(Duration::from_millis(1)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_release_owned_requires_matching_owner() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let token = CancelToken::new();
        let other = CancelToken::new();

        let guard = coalescer.acquire("k", Some(&token)).await;
        assert!(!coalescer.release_owned("k", other.id()));
        assert!(coalescer.is_in_flight("k"));

        assert!(coalescer.release_owned("k", token.id()));
        assert!(!coalescer.is_in_flight("k"));

        // A later holder must not be released by the stale guard.
        let next = coalescer.acquire("k", None).await;
        drop(guard);
        assert!(coalescer.is_in_flight("k"));
        drop(next);
        assert!(!coalescer.is_in_flight("k"));
    }

    #[tokio::test]
    async fn test_cancelling_token_releases_registered_key() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let token = CancelToken::new();
        let _guard = coalescer.acquire("k", Some(&token)).await;

        let waiter = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move { coalescer.acquire("k", None).await.waited() })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        token.cancel();

        let waited = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancel should release waiters")
            .unwrap();
        assert!(waited);
    }

    #[tokio::test]
    async fn test_abandoned_wait_drops_registration() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let token = CancelToken::new();
        let holder = coalescer.acquire("k", None).await;

        let waiting = tokio::time::timeout(Duration::from_millis(20), coalescer.acquire("k", Some(&token))).await;
        assert!(waiting.is_err());
        assert_eq!(token.registered_keys(), 0);

        drop(holder);
        assert_eq!(coalescer.in_flight_count(), 0);
    }
}
