//! Caller-facing client.
//!
//! A [`Client`] owns one instance of everything the middleware shares: the
//! cache backends, the in-flight registry, the metrics and the background
//! sweeper. Independent clients share nothing.
//!
//! # Lifecycle
//!
//! ```text
//! start()
//!   ├── probe persistent cache (once)
//!   ├── build pipeline: RetryStage → LogStage → CacheStage → transport
//!   └── spawn ExpirySweeper (sweeps now, then every interval)
//!
//! get() / post() / send()  ──► Supervisor ──► Pipeline
//!
//! shutdown()  ──► stop sweeper, wait for it
//! ```

mod options;

pub use options::RequestOptions;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::providers::{DiskBackend, MemoryBackend};
use crate::cache::{CacheStore, CacheTarget, ExpirySweeper, SweepReport};
use crate::cancel::{CancelToken, Supervisor};
use crate::coalesce::RequestCoalescer;
use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::http::{ReqwestTransport, Request, RequestBody, Response, Transport, TransportError};
use crate::pipeline::{CacheStage, LogStage, Pipeline, RetryStage};
use crate::telemetry::{RequestMetrics, TelemetrySnapshot};

struct ClientInner {
    config: ClientConfig,
    store: Arc<CacheStore>,
    coalescer: Arc<RequestCoalescer>,
    pipeline: Pipeline,
    metrics: Arc<RequestMetrics>,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Request middleware client. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Starts a client that sends requests with reqwest.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn start(config: ClientConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::build(config.http_timeout, Some(&config.user_agent))?;
        Ok(Self::with_transport(config, Arc::new(transport)).await)
    }

    /// Starts a client in front of a custom transport.
    pub async fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let store = Arc::new(build_store(&config).await);
        let coalescer = Arc::new(RequestCoalescer::new());
        let metrics = Arc::new(RequestMetrics::new());

        let pipeline = Pipeline::new(transport, Arc::clone(&metrics))
            .with_stage(Arc::new(RetryStage::new(config.retry.clone(), Arc::clone(&metrics))))
            .with_stage(Arc::new(LogStage))
            .with_stage(Arc::new(CacheStage::new(
                Arc::clone(&store),
                Arc::clone(&coalescer),
                config.body_hasher,
                Arc::clone(&metrics),
            )));

        let shutdown = CancellationToken::new();
        let sweeper = ExpirySweeper::new(Arc::clone(&store), config.sweep_interval);
        let sweeper = tokio::spawn(sweeper.run(shutdown.clone()));

        info!(
            backends = ?store.available_targets(),
            stages = ?pipeline.stage_names(),
            max_retries = config.retry.max_retries,
            "Client started"
        );

        Self {
            inner: Arc::new(ClientInner {
                config,
                store,
                coalescer,
                pipeline,
                metrics,
                shutdown,
                sweeper: Mutex::new(Some(sweeper)),
            }),
        }
    }

    /// Issues a GET with `query` appended in order.
    pub async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        options: RequestOptions,
    ) -> Result<Response, FetchError> {
        let request = query
            .iter()
            .fold(Request::get(url), |request, (k, v)| request.with_query(*k, *v));
        self.send(request, options).await
    }

    /// Issues a POST with `body`.
    pub async fn post(
        &self,
        url: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<Response, FetchError> {
        self.send(Request::post(url, body), options).await
    }

    /// Sends `request` through the supervisor and pipeline.
    pub async fn send(&self, mut request: Request, options: RequestOptions) -> Result<Response, FetchError> {
        let RequestOptions {
            cache,
            retries,
            timeout,
            cancel_token,
            response_type,
        } = options;

        request.meta.cache = cache;
        request.meta.max_retries = retries;
        if let Some(response_type) = response_type {
            request.response_type = response_type;
        }

        let pipeline = &self.inner.pipeline;
        Supervisor::run(timeout, cancel_token, move |token| async move {
            request.meta.cancel_token = token;
            pipeline.execute(request).await
        })
        .await
    }

    /// Bounds a multi-request operation by `timeout`.
    ///
    /// `op` receives the governing token; attach it to each request (via
    /// [`RequestOptions::with_cancel_token`]) so a timeout aborts them.
    pub async fn supervise<T, F, Fut>(
        &self,
        timeout: Option<Duration>,
        token: Option<CancelToken>,
        op: F,
    ) -> Result<T, FetchError>
    where
        F: FnOnce(Option<CancelToken>) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        Supervisor::run(timeout, token, op).await
    }

    /// Creates a fresh cancel token.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken::new()
    }

    /// Clears the given backends, or every backend when `targets` is `None`.
    ///
    /// Returns the number of backends cleared. Safe to call repeatedly.
    pub async fn invalidate_caches(&self, targets: Option<&[CacheTarget]>) -> usize {
        let cleared = self.inner.store.invalidate(targets).await;
        info!(targets = ?targets, cleared = cleared, "Caches invalidated");
        cleared
    }

    /// Runs one expiry sweep now.
    pub async fn sweep_now(&self) -> SweepReport {
        ExpirySweeper::new(Arc::clone(&self.inner.store), self.inner.config.sweep_interval)
            .sweep_once()
            .await
    }

    /// Backends available to this client.
    pub fn available_targets(&self) -> Vec<CacheTarget> {
        self.inner.store.available_targets()
    }

    /// Number of cache keys currently being fetched.
    pub fn in_flight_count(&self) -> usize {
        self.inner.coalescer.in_flight_count()
    }

    /// Snapshot of the request counters.
    pub fn stats(&self) -> TelemetrySnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Stops the background sweeper and waits for it to exit.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let handle = self.inner.sweeper.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Expiry sweeper task failed");
            }
        }
    }
}

/// Builds the store, probing the persistent backend once.
async fn build_store(config: &ClientConfig) -> CacheStore {
    let store = CacheStore::new(Arc::new(MemoryBackend::new(config.memory_cache_bytes)));
    if !config.persistent_cache {
        return store;
    }

    match DiskBackend::open(&config.cache_dir).await {
        Ok(disk) => {
            info!(directory = %config.cache_dir.display(), "Persistent cache enabled");
            store.with_persistent(Arc::new(disk))
        }
        Err(e) => {
            warn!(
                directory = %config.cache_dir.display(),
                error = %e,
                "Persistent cache unavailable, using memory only"
            );
            store
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::cancel::CancelReason;
    use crate::http::{MockReply, MockTransport};
    use crate::retry::RetryPolicy;
    use serde_json::json;
    use tempfile::TempDir;

    fn memory_only() -> ClientConfig {
        ClientConfig::default()
            .with_persistent_cache(false)
            .with_retry(RetryPolicy::fixed(2, Duration::from_millis(3000)))
    }

    #[tokio::test]
    async fn test_persistent_cache_is_probed() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockTransport::always(MockReply::ok_json(json!(1))));
        let config = ClientConfig::default().with_cache_dir(dir.path().join("cache"));

        let client = Client::with_transport(config, mock).await;
        assert_eq!(client.available_targets(), vec![CacheTarget::Memory, CacheTarget::Disk]);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_unusable_cache_dir_falls_back_to_memory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let mock = Arc::new(MockTransport::always(MockReply::ok_json(json!(1))));

        let config = ClientConfig::default().with_cache_dir(blocker.join("cache"));
        let client = Client::with_transport(config, mock).await;

        assert_eq!(client.available_targets(), vec![CacheTarget::Memory]);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_with_cache_hits_second_time() {
        let mock = Arc::new(MockTransport::always(MockReply::ok_json(json!({"id": 3}))));
        let client = Client::with_transport(memory_only(), mock.clone()).await;
        let options = || RequestOptions::new().with_cache(CacheConfig::expires_in(60));

        client.get("https://a", &[("q", "1")], options()).await.unwrap();
        let second = client.get("https://a", &[("q", "1")], options()).await.unwrap();

        assert!(second.from_cache());
        assert_eq!(mock.calls(), 1);
        assert_eq!(client.stats().cache_hits, 1);
        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_option_cancels_slow_request() {
        let mock = Arc::new(
            MockTransport::always(MockReply::ok_json(json!(1))).with_delay(Duration::from_secs(10)),
        );
        let client = Client::with_transport(memory_only(), mock).await;
        let options = RequestOptions::new()
            .with_cache(CacheConfig::expires_in(60))
            .with_timeout(Duration::from_millis(250));

        let err = client.get("https://slow", &[], options).await.unwrap_err();

        assert!(matches!(
            err,
            FetchError::Cancelled {
                reason: CancelReason::Timeout,
                ..
            }
        ));
        assert_eq!(client.in_flight_count(), 0);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let mock = Arc::new(MockTransport::always(MockReply::ok_json(json!(1))));
        let client = Client::with_transport(memory_only(), mock.clone()).await;
        let options = || RequestOptions::new().with_cache(CacheConfig::expires_in(60));

        client.get("https://a", &[], options()).await.unwrap();
        assert_eq!(client.invalidate_caches(None).await, 1);
        assert_eq!(client.invalidate_caches(None).await, 1);
        client.get("https://a", &[], options()).await.unwrap();

        assert_eq!(mock.calls(), 2);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_repeatable() {
        let mock = Arc::new(MockTransport::always(MockReply::ok_json(json!(1))));
        let client = Client::with_transport(memory_only(), mock).await;
        client.shutdown().await;
        client.shutdown().await;
    }
}
