//! Cache stage - coalesces duplicate requests and serves/stores cached responses.
//!
//! For a cacheable request (GET or POST with `expires_in > 0`):
//!
//! 1. Compute the cache key and claim it in the coalescer, waiting while an
//!    identical request is in flight. The key is registered against the
//!    request's cancel token.
//! 2. On a fresh cache hit, answer from the cache and release the key.
//! 3. On a miss, fetch with the key held. After a successful response,
//!    write the entry unless a fresh one already exists, then release.
//!
//! The key is released through an RAII guard, so failures, cancellation
//! and dropped futures release it too. Cache failures never propagate:
//! the cache is an optimization, not a requirement.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use crate::cache::{cache_key, now_millis, BodyHasher, CacheConfig, CacheEntry, CacheStore};
use crate::coalesce::RequestCoalescer;
use crate::error::FetchError;
use crate::http::{Request, Response};
use crate::pipeline::{Next, Stage};
use crate::telemetry::RequestMetrics;

/// Coalescing, cache read and cache write.
pub struct CacheStage {
    store: Arc<CacheStore>,
    coalescer: Arc<RequestCoalescer>,
    hasher: BodyHasher,
    metrics: Arc<RequestMetrics>,
}

impl CacheStage {
    pub fn new(
        store: Arc<CacheStore>,
        coalescer: Arc<RequestCoalescer>,
        hasher: BodyHasher,
        metrics: Arc<RequestMetrics>,
    ) -> Self {
        Self {
            store,
            coalescer,
            hasher,
            metrics,
        }
    }
}

impl Stage for CacheStage {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn handle<'a>(&'a self, mut request: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, FetchError>> {
        Box::pin(async move {
            let Some(config) = request.meta.cache.clone().filter(CacheConfig::is_enabled) else {
                return next.run(request).await;
            };
            let Some(key) = cache_key(&request, self.hasher) else {
                return next.run(request).await;
            };

            let cache = self.store.select(&config.targets);
            let guard = self
                .coalescer
                .acquire(&key, request.meta.cancel_token.as_ref())
                .await;
            if guard.waited() {
                self.metrics.coalesced_wait();
            }

            if let Some(entry) = cache.get_fresh(&key).await {
                drop(guard);
                self.metrics.cache_hit();
                debug!(key = %key, backend = %cache.target(), "Cache hit");
                return Ok(entry.into_response());
            }
            self.metrics.cache_miss();

            request.meta.cache_key = Some(key.clone());
            let response = next.run(request).await?;

            if cache.has_fresh(&key).await {
                debug!(key = %key, "Fresh entry already stored, skipping write");
            } else {
                let entry = CacheEntry::from_response(key.as_str(), &response, config.expires_in, now_millis());
                cache.put(&key, entry).await;
                self.metrics.cache_write();
            }

            drop(guard);
            Ok(response)
        })
    }
}
