//! Per-call options.

use std::time::Duration;

use crate::cache::CacheConfig;
use crate::cancel::CancelToken;
use crate::http::ResponseType;

/// How a single call should be cached, retried and bounded.
///
/// Every field is optional; unset fields fall back to the client's
/// configuration (no caching, the configured retry count, no timeout).
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Cache this call's response; `None` or `expires_in == 0` disables caching.
    pub cache: Option<CacheConfig>,
    /// Retries after the first attempt, overriding the client default.
    pub retries: Option<u32>,
    /// Bound on the whole call including retries.
    pub timeout: Option<Duration>,
    /// Token that aborts the call when cancelled.
    pub cancel_token: Option<CancelToken>,
    /// Declared response shape; defaults to JSON.
    pub response_type: Option<ResponseType>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }
}
