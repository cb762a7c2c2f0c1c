//! Log stage - debug logging of every attempt.

use std::time::Instant;

use futures::future::BoxFuture;
use tracing::debug;

use crate::error::FetchError;
use crate::http::{Request, Response};
use crate::pipeline::{Next, Stage};

/// Logs each attempt and its outcome at debug level.
#[derive(Debug, Default)]
pub struct LogStage;

impl Stage for LogStage {
    fn name(&self) -> &'static str {
        "log"
    }

    fn handle<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, FetchError>> {
        Box::pin(async move {
            let method = request.method;
            let url = request.url.clone();
            let attempt = request.attempts();
            debug!(
                method = %method,
                url = %url,
                query = ?request.query,
                attempt = attempt,
                "Request"
            );

            let start = Instant::now();
            let result = next.run(request).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(response) => debug!(
                    method = %method,
                    url = %url,
                    status = response.status,
                    from_cache = response.from_cache(),
                    elapsed_ms = elapsed_ms,
                    "Response"
                ),
                Err(e) => debug!(
                    method = %method,
                    url = %url,
                    error = %e,
                    elapsed_ms = elapsed_ms,
                    "Request failed"
                ),
            }
            result
        })
    }
}
