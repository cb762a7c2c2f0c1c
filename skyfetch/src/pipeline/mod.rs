//! Ordered middleware pipeline.
//!
//! Every request runs through a fixed list of [`Stage`]s and then the
//! transport. Each stage receives the request and a [`Next`] handle for the
//! rest of the chain, so it can act before dispatch, after the response, or
//! both (and may call `next` more than once, as the retry stage does).
//!
//! ```text
//!  execute ──► RetryStage ──► LogStage ──► CacheStage ──► dispatch ──► Transport
//!                 ▲  │                       (coalesce,      │
//!                 │  │ 429/5xx: delay,        read/write)    │ non-2xx → FetchError::Status
//!                 │  └─ resubmit ─────────────────────────────┘
//!                 └──────────────── response / error ◄────────┘
//! ```
//!
//! [`Pipeline::execute`] races the whole chain against the request's cancel
//! token; on cancellation the chain future is dropped, which aborts the
//! transport call and releases any in-flight cache key.

pub mod stages;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::cancel::CancelReason;
use crate::error::FetchError;
use crate::http::{Request, Response, Transport};
use crate::telemetry::RequestMetrics;

pub use stages::{CacheStage, LogStage, RetryStage};

/// One step of the request pipeline.
pub trait Stage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Handles `request`, delegating to `next` for the rest of the chain.
    fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, FetchError>>;
}

/// The remainder of the chain after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    transport: &'a dyn Transport,
    metrics: &'a RequestMetrics,
}

impl<'a> Next<'a> {
    /// Runs the remaining stages and then the transport.
    pub fn run(self, request: Request) -> BoxFuture<'a, Result<Response, FetchError>> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(request, Next { stages: rest, ..self }),
            None => Box::pin(dispatch(self.transport, self.metrics, request)),
        }
    }
}

/// Sends the request and turns non-2xx responses into errors.
async fn dispatch(
    transport: &dyn Transport,
    metrics: &RequestMetrics,
    request: Request,
) -> Result<Response, FetchError> {
    metrics.network_call();
    let response = transport
        .send(&request)
        .await
        .map_err(|e| FetchError::transport(&request.url, e))?;
    metrics.bytes_received(response.body_len());

    if response.is_success() {
        Ok(response)
    } else {
        Err(FetchError::status(&request.url, response))
    }
}

/// An ordered list of stages in front of a transport.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    transport: Arc<dyn Transport>,
    metrics: Arc<RequestMetrics>,
}

impl Pipeline {
    /// Creates a pipeline with no stages.
    pub fn new(transport: Arc<dyn Transport>, metrics: Arc<RequestMetrics>) -> Self {
        Self {
            stages: Vec::new(),
            transport,
            metrics,
        }
    }

    /// Appends a stage; stages run in the order they were added.
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Names of the installed stages, outermost first.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs `request` through every stage and the transport.
    pub async fn execute(&self, request: Request) -> Result<Response, FetchError> {
        self.metrics.request_started();

        let url = request.url.clone();
        let token = request.meta.cancel_token.clone();
        let chain = Next {
            stages: &self.stages,
            transport: self.transport.as_ref(),
            metrics: &self.metrics,
        }
        .run(request);

        let result = match token {
            Some(token) if token.is_cancelled() => Err(cancelled(token.reason(), &url)),
            Some(token) => {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => Err(cancelled(token.reason(), &url)),
                    result = chain => result,
                }
            }
            None => chain.await,
        };

        match &result {
            Err(e) if e.is_cancelled() => self.metrics.request_cancelled(),
            Err(_) => self.metrics.request_failed(),
            Ok(_) => {}
        }
        result
    }
}

fn cancelled(reason: Option<CancelReason>, url: &str) -> FetchError {
    FetchError::cancelled(reason.unwrap_or(CancelReason::Requested), Some(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::http::{MockReply, MockTransport, ResponseBody, TransportError};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    /// Records the order stages see a request and its response.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Stage for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, FetchError>> {
            Box::pin(async move {
                self.log.lock().push(format!("{}:request", self.name));
                let result = next.run(request).await;
                self.log.lock().push(format!("{}:response", self.name));
                result
            })
        }
    }

    fn pipeline(mock: Arc<MockTransport>) -> Pipeline {
        Pipeline::new(mock, Arc::new(RequestMetrics::new()))
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mock = Arc::new(MockTransport::always(MockReply::ok_json(json!({"ok": true}))));
        let pipeline = pipeline(mock)
            .with_stage(Arc::new(Recorder { name: "outer", log: Arc::clone(&log) }))
            .with_stage(Arc::new(Recorder { name: "inner", log: Arc::clone(&log) }));

        assert_eq!(pipeline.stage_names(), vec!["outer", "inner"]);
        pipeline.execute(Request::get("https://a")).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["outer:request", "inner:request", "inner:response", "outer:response"]
        );
    }

    #[tokio::test]
    async fn test_non_success_becomes_status_error() {
        let mock = Arc::new(MockTransport::always(MockReply::status(404)));
        let err = pipeline(mock).execute(Request::get("https://a")).await.unwrap_err();

        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.response().map(|r| r.status_text.as_str()), Some("Not Found"));
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces() {
        let mock = Arc::new(MockTransport::always(MockReply::Fail("reset".into())));
        let err = pipeline(mock).execute(Request::get("https://a")).await.unwrap_err();

        assert!(matches!(
            err,
            FetchError::Transport {
                source: TransportError::Request(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_metrics_count_network_calls_and_bytes() {
        let mock = Arc::new(MockTransport::always(MockReply::Status(
            200,
            ResponseBody::Text("abcd".into()),
        )));
        let metrics = Arc::new(RequestMetrics::new());
        let pipeline = Pipeline::new(mock, Arc::clone(&metrics));

        pipeline.execute(Request::get("https://a")).await.unwrap();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 1);
        assert_eq!(snapshot.network_calls, 1);
        assert_eq!(snapshot.bytes_received, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_call() {
        let mock = Arc::new(
            MockTransport::always(MockReply::ok_json(json!(1))).with_delay(Duration::from_secs(30)),
        );
        let pipeline = Arc::new(pipeline(Arc::clone(&mock)));
        let token = CancelToken::new();

        let mut request = Request::get("https://slow");
        request.meta.cancel_token = Some(token.clone());

        let task = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.execute(request).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            FetchError::Cancelled {
                reason: CancelReason::Requested,
                ..
            }
        ));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_token_never_dispatches() {
        let mock = Arc::new(MockTransport::always(MockReply::ok_json(json!(1))));
        let token = CancelToken::new();
        token.cancel();

        let mut request = Request::get("https://a");
        request.meta.cancel_token = Some(token);

        let err = pipeline(Arc::clone(&mock)).execute(request).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(mock.calls(), 0);
    }
}
