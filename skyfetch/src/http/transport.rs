//! HTTP transport abstraction for testability

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use thiserror::Error;

use super::{Headers, Method, Request, Response, ResponseBody, ResponseType};

/// Default request timeout for the reqwest transport.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised before a response is available.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The URL or query could not be assembled.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The request could not be sent or no response arrived.
    #[error("Request failed: {0}")]
    Request(String),

    /// The response body could not be read.
    #[error("Failed to read response: {0}")]
    Body(String),

    /// The body did not match the declared response shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The underlying client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Build(String),
}

/// Trait for outbound HTTP calls.
///
/// Implementations return a [`Response`] for every status code; turning
/// non-2xx statuses into errors is the pipeline's job. This abstraction
/// allows for dependency injection and mock transports in tests.
pub trait Transport: Send + Sync {
    /// Sends the request and returns the decoded response.
    fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>>;
}

/// Real transport implementation using async reqwest.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a new transport with default configuration.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new transport with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        Self::build(timeout, None)
    }

    /// Creates a new transport with a timeout and user agent.
    pub fn build(timeout: Duration, user_agent: Option<&str>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(async move {
            let url = build_url(&request.url, &request.query)?;
            let mut builder = self.client.request(reqwest_method(request.method), url);

            for (name, value) in request.headers.iter() {
                builder = builder.header(name, value);
            }
            if let Some(body) = &request.body {
                if !request.headers.contains("content-type") {
                    builder = builder.header(reqwest::header::CONTENT_TYPE, body.content_type());
                }
                builder = builder.body(body.to_bytes());
            }

            let response = builder
                .send()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;

            let status = response.status();
            let headers: Headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();

            let bytes = response
                .bytes()
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;
            let wire_len = bytes.len();
            let body = decode_body(request.response_type, bytes, status.is_success())?;

            Ok(Response::with_wire_len(
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                headers,
                body,
                wire_len,
            ))
        })
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

/// Joins the base URL and ordered query pairs.
pub(crate) fn build_url(base: &str, query: &[(String, String)]) -> Result<url::Url, TransportError> {
    let parsed = if query.is_empty() {
        url::Url::parse(base)
    } else {
        url::Url::parse_with_params(base, query)
    };
    parsed.map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base, e)))
}

/// Decodes raw body bytes according to the declared response shape.
///
/// Error responses whose body is not valid JSON fall back to text so the
/// status still reaches the caller.
pub(crate) fn decode_body(
    response_type: ResponseType,
    bytes: Bytes,
    success: bool,
) -> Result<ResponseBody, TransportError> {
    match response_type {
        ResponseType::Bytes => Ok(ResponseBody::Bytes(bytes)),
        ResponseType::Text => Ok(ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())),
        ResponseType::Json if bytes.is_empty() => Ok(ResponseBody::Json(serde_json::Value::Null)),
        ResponseType::Json => match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(ResponseBody::Json(value)),
            Err(_) if !success => Ok(ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) => Err(TransportError::Decode(e.to_string())),
        },
    }
}
