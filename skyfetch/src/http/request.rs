//! Outgoing request descriptor.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use serde_json::Value;

use super::Headers;
use crate::cache::CacheConfig;
use crate::cancel::CancelToken;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl Method {
    /// Returns the canonical upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared shape of the response body.
///
/// Decides how the transport decodes the payload and how the persistent
/// cache serializes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Parse the body as JSON.
    #[default]
    Json,
    /// Decode the body as UTF-8 text.
    Text,
    /// Keep the body as opaque bytes (imagery, blobs).
    Bytes,
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    Json(Value),
    Bytes(Bytes),
}

impl RequestBody {
    /// Returns the body normalized to a string.
    ///
    /// Text is returned verbatim, JSON is stringified and bytes are decoded
    /// lossily. This is the input to POST cache-key hashing.
    pub fn normalized(&self) -> Cow<'_, str> {
        match self {
            RequestBody::Text(text) => Cow::Borrowed(text),
            RequestBody::Json(value) => Cow::Owned(value.to_string()),
            RequestBody::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    /// Returns the wire bytes of the body.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            RequestBody::Text(text) => Bytes::from(text.clone()),
            RequestBody::Json(value) => Bytes::from(value.to_string()),
            RequestBody::Bytes(bytes) => bytes.clone(),
        }
    }

    /// Default content type for this body kind.
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Text(_) => "text/plain; charset=utf-8",
            RequestBody::Json(_) => "application/json",
            RequestBody::Bytes(_) => "application/octet-stream",
        }
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

/// Per-call middleware state carried alongside the request.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestMeta {
    pub(crate) cache: Option<CacheConfig>,
    pub(crate) max_retries: Option<u32>,
    pub(crate) attempts: u32,
    pub(crate) cancel_token: Option<CancelToken>,
    pub(crate) cache_key: Option<String>,
}

/// An outgoing HTTP request.
///
/// Query parameters keep their insertion order; the cache key for GET
/// requests is built from them in that order.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Headers,
    pub body: Option<RequestBody>,
    pub response_type: ResponseType,
    pub(crate) meta: RequestMeta,
}

impl Request {
    /// Creates a request with no query, headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Headers::new(),
            body: None,
            response_type: ResponseType::default(),
            meta: RequestMeta::default(),
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a POST request with the given body.
    pub fn post(url: impl Into<String>, body: impl Into<RequestBody>) -> Self {
        Self::new(Method::Post, url).with_body(body)
    }

    /// Appends a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the declared response shape.
    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Cache configuration attached to this call, if any.
    pub fn cache_config(&self) -> Option<&CacheConfig> {
        self.meta.cache.as_ref()
    }

    /// Cancel token attached to this call, if any.
    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.meta.cancel_token.as_ref()
    }

    /// Number of retries already performed for this logical call.
    pub fn attempts(&self) -> u32 {
        self.meta.attempts
    }

    /// Cache key this request was tagged with after a cache miss.
    pub fn cache_key(&self) -> Option<&str> {
        self.meta.cache_key.as_deref()
    }
}
