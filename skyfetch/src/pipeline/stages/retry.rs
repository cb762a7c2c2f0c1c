//! Retry stage - resubmits transient server failures.
//!
//! Installed outermost so that each resubmission re-enters the rest of the
//! chain (logging, coalescing, cache) exactly like a fresh request.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;

use crate::error::FetchError;
use crate::http::{Request, Response};
use crate::pipeline::{Next, Stage};
use crate::retry::RetryPolicy;
use crate::telemetry::RequestMetrics;

/// Applies a [`RetryPolicy`]; the per-call retry count overrides the policy's.
pub struct RetryStage {
    policy: RetryPolicy,
    metrics: Arc<RequestMetrics>,
}

impl RetryStage {
    pub fn new(policy: RetryPolicy, metrics: Arc<RequestMetrics>) -> Self {
        Self { policy, metrics }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl Stage for RetryStage {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn handle<'a>(&'a self, mut request: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, FetchError>> {
        Box::pin(async move {
            let policy = match request.meta.max_retries {
                Some(max_retries) => self.policy.clone().with_max_retries(max_retries),
                None => self.policy.clone(),
            };

            loop {
                let error = match next.run(request.clone()).await {
                    Ok(response) => return Ok(response),
                    Err(error) => error,
                };

                let Some(delay) = policy.next_delay(request.meta.attempts, &error) else {
                    return Err(error);
                };

                request.meta.attempts += 1;
                self.metrics.retry_scheduled();
                warn!(
                    url = %request.url,
                    status = error.status_code(),
                    attempt = request.meta.attempts,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
            }
        })
    }
}
