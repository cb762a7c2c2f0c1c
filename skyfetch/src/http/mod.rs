//! HTTP request/response descriptors and the transport seam.
//!
//! The middleware never talks to the network directly. It mutates a
//! [`Request`] descriptor as it passes through the pipeline and hands the
//! final descriptor to a [`Transport`]. [`ReqwestTransport`] is the real
//! implementation; tests plug in scripted transports.

mod headers;
mod request;
mod response;
mod transport;

pub use headers::Headers;
pub use request::{Method, Request, RequestBody, ResponseType};
pub use response::{Response, ResponseBody};
pub use transport::{ReqwestTransport, Transport, TransportError, DEFAULT_TIMEOUT_SECS};

#[cfg(test)]
pub use transport::tests::{MockReply, MockTransport};
