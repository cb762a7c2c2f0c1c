//! Errors surfaced to callers of the middleware.
//!
//! Cache backend failures never appear here; they are downgraded to misses
//! and no-ops inside [`crate::cache::CacheStore`].

use thiserror::Error;

use crate::cancel::CancelReason;
use crate::http::{Response, TransportError};

/// Errors a caller can observe from a request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No response was received (connection failure, invalid URL, unreadable body).
    ///
    /// Never retried.
    #[error("Transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    /// The operation was cancelled by its token or by a timeout.
    ///
    /// Never retried.
    #[error("Request cancelled ({reason}){}", describe_target(.url))]
    Cancelled {
        reason: CancelReason,
        url: Option<String>,
    },

    /// The server answered with a non-2xx status.
    ///
    /// Retryable when the status is 429 or 5xx.
    #[error("HTTP {status} {status_text} from {url}")]
    Status {
        status: u16,
        status_text: String,
        url: String,
        response: Box<Response>,
    },
}

fn describe_target(url: &Option<String>) -> String {
    url.as_ref().map(|u| format!(": {}", u)).unwrap_or_default()
}

impl FetchError {
    pub(crate) fn transport(url: &str, source: TransportError) -> Self {
        FetchError::Transport {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn cancelled(reason: CancelReason, url: Option<&str>) -> Self {
        FetchError::Cancelled {
            reason,
            url: url.map(str::to_string),
        }
    }

    pub(crate) fn status(url: &str, response: Response) -> Self {
        FetchError::Status {
            status: response.status,
            status_text: response.status_text.clone(),
            url: url.to_string(),
            response: Box::new(response),
        }
    }

    /// Returns `true` if a response was received with status 429 or 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => is_retryable_status(*status),
            FetchError::Transport { .. } | FetchError::Cancelled { .. } => false,
        }
    }

    /// Returns `true` if this error came from cancellation or a timeout.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled { .. })
    }

    /// The HTTP status, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The error response, if one was received.
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchError::Status { response, .. } => Some(response),
            _ => None,
        }
    }
}

/// Status codes worth resubmitting: rate limiting and server errors.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}
