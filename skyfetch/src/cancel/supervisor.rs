//! Timeout supervision.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::{CancelReason, CancelToken};
use crate::error::FetchError;

/// Bounds the wall-clock time of a logical operation.
///
/// The operation may issue several requests; it receives the governing token
/// and should attach it to each of them so that a timeout aborts whichever
/// one is in flight and releases its cache keys.
pub struct Supervisor;

tokio::task_local! {
    /// Ids of the tokens governed by supervisors enclosing the running code.
    static GOVERNING: Vec<u64>;
}

fn governed_by_enclosing(token: &CancelToken) -> bool {
    GOVERNING
        .try_with(|ids| ids.contains(&token.id()))
        .unwrap_or(false)
}

/// Holds one governance count on the token until the supervised operation
/// settles or is dropped.
struct Governance(CancelToken);

impl Governance {
    fn new(token: CancelToken) -> Self {
        token.govern();
        Self(token)
    }
}

impl Drop for Governance {
    fn drop(&mut self) {
        self.0.release_governance();
    }
}

impl Supervisor {
    /// Runs `op` under an optional timeout.
    ///
    /// - No timeout: `op` runs unwrapped with the caller's token, if any.
    /// - Timeout: the caller's token is reused (or a new one created) and
    ///   cancelled with [`CancelReason::Timeout`] once `timeout` elapses.
    ///
    /// A wrapper running inside another supervisor's operation on the same
    /// token gets no second timer; the outer deadline applies. Concurrent
    /// wrappers that share a token are not nested and each keep their own
    /// deadline.
    pub async fn run<T, F, Fut>(
        timeout: Option<Duration>,
        token: Option<CancelToken>,
        op: F,
    ) -> Result<T, FetchError>
    where
        F: FnOnce(Option<CancelToken>) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let Some(timeout) = timeout else {
            return op(token).await;
        };

        let token = token.unwrap_or_default();
        if governed_by_enclosing(&token) {
            debug!(token = token.id(), "Token already governed by an outer timeout");
            return op(Some(token)).await;
        }

        let mut governing = GOVERNING.try_with(Clone::clone).unwrap_or_default();
        governing.push(token.id());
        let _governance = Governance::new(token.clone());
        let governed = GOVERNING.scope(governing, op(Some(token.clone())));

        tokio::select! {
            result = governed => result,
            _ = tokio::time::sleep(timeout) => {
                warn!(
                    token = token.id(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Operation timed out"
                );
                token.cancel_with(CancelReason::Timeout);
                Err(FetchError::cancelled(CancelReason::Timeout, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::coalesce::RequestCoalescer;

    #[tokio::test(start_paused = true)]
    async fn test_no_timeout_runs_unwrapped() {
        let result = Supervisor::run(None, None, |token| async move {
            assert!(token.is_none());
            Ok::<_, FetchError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_operation_is_not_cancelled() {
        let token = CancelToken::new();
        let result = Supervisor::run(Some(Duration::from_secs(5)), Some(token.clone()), |t| async move {
            assert!(t.is_some_and(|t| t.is_governed()));
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, FetchError>("done")
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert!(!token.is_cancelled());
        assert!(!token.is_governed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_token_and_releases_keys() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let token = CancelToken::new();
        let start = tokio::time::Instant::now();

        let result = {
            let coalescer = Arc::clone(&coalescer);
            Supervisor::run(Some(Duration::from_millis(500)), Some(token.clone()), |t| async move {
                let _guard = coalescer.acquire("slow", t.as_ref()).await;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, FetchError>(())
            })
            .await
        };

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Cancelled {
                reason: CancelReason::Timeout,
                ..
            }
        ));
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(token.reason(), Some(CancelReason::Timeout));
        assert!(!coalescer.is_in_flight("slow"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesizes_token_when_none_given() {
        let result = Supervisor::run(Some(Duration::from_secs(1)), None, |t| async move {
            Ok::<_, FetchError>(t.is_some())
        })
        .await;
        assert!(result.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nested_wrapper_defers_to_outer_timeout() {
        let start = tokio::time::Instant::now();

        let result = Supervisor::run(Some(Duration::from_millis(200)), None, |outer| async move {
            // The inner deadline would never fire first; the outer one must.
            Supervisor::run(Some(Duration::from_secs(30)), outer, |inner| async move {
                let inner = inner.unwrap_or_default();
                inner.cancelled().await;
                Err::<(), _>(FetchError::cancelled(
                    inner.reason().unwrap_or(CancelReason::Requested),
                    None,
                ))
            })
            .await
        })
        .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_wrappers_on_one_token_keep_their_deadlines() {
        let token = CancelToken::new();
        let start = tokio::time::Instant::now();

        let quick = Supervisor::run(Some(Duration::from_millis(100)), Some(token.clone()), |_| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, FetchError>(())
        });
        let slow = Supervisor::run(Some(Duration::from_millis(200)), Some(token.clone()), |_| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, FetchError>(())
        });
        let (quick, slow) = tokio::join!(quick, slow);

        assert!(quick.is_ok());
        assert!(matches!(
            slow,
            Err(FetchError::Cancelled {
                reason: CancelReason::Timeout,
                ..
            })
        ));
        assert_eq!(start.elapsed(), Duration::from_millis(200));
        assert_eq!(token.reason(), Some(CancelReason::Timeout));
        assert!(!token.is_governed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sibling_is_not_treated_as_nested() {
        let token = CancelToken::new();
        let start = tokio::time::Instant::now();

        let outer = Supervisor::run(Some(Duration::from_secs(60)), Some(token.clone()), |t| async move {
            let t = t.unwrap_or_default();
            // A separate task does not run inside the enclosing operation.
            let sibling = tokio::spawn(Supervisor::run(Some(Duration::from_millis(300)), Some(t), |_| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, FetchError>(())
            }));
            Ok::<_, FetchError>(sibling.await.unwrap())
        })
        .await;

        // The sibling's own timer fired and cancelled the shared token.
        assert!(outer.unwrap().unwrap_err().is_cancelled());
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }
}
