//! Response descriptor returned through the pipeline.

use std::io;

use bytes::Bytes;
use serde_json::Value;

use super::Headers;

/// Decoded response payload, shaped by the request's [`ResponseType`].
///
/// [`ResponseType`]: super::ResponseType
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

/// Counts bytes written without keeping them.
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseBody {
    /// Size of the payload in bytes.
    ///
    /// JSON is measured by serializing it, so prefer [`Response::body_len`],
    /// which is computed once per response.
    pub fn len(&self) -> usize {
        match self {
            ResponseBody::Json(value) => {
                let mut counter = ByteCounter(0);
                match serde_json::to_writer(&mut counter, value) {
                    Ok(()) => counter.0,
                    Err(_) => 0,
                }
            }
            ResponseBody::Text(text) => text.len(),
            ResponseBody::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An HTTP response, either from the network or synthesized from cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: ResponseBody,
    pub(crate) body_len: usize,
    pub(crate) from_cache: bool,
}

impl Response {
    /// Creates a network response.
    pub fn new(status: u16, status_text: impl Into<String>, headers: Headers, body: ResponseBody) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers,
            body_len: body.len(),
            body,
            from_cache: false,
        }
    }

    /// Creates a network response whose payload measured `body_len` bytes on
    /// the wire.
    pub(crate) fn with_wire_len(
        status: u16,
        status_text: impl Into<String>,
        headers: Headers,
        body: ResponseBody,
        body_len: usize,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers,
            body,
            body_len,
            from_cache: false,
        }
    }

    /// Payload size in bytes, measured once when the response was built.
    pub fn body_len(&self) -> usize {
        self.body_len
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns `true` if this response was served from cache.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// The JSON payload, if the body is JSON.
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The text payload, if the body is text.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The binary payload, if the body is bytes.
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.body {
            ResponseBody::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}
