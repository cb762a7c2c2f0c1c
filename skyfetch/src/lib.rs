//! Skyfetch - request middleware for satellite imagery clients
//!
//! This library sits in front of an outbound HTTP transport and cuts redundant
//! traffic against rate-limited imagery backends. Every request flows through
//! an explicit, ordered pipeline:
//!
//! ```text
//! Client ──► Supervisor (timeout / cancel)
//!              │
//!              ▼
//!            RetryStage ⟲ ──► LogStage ──► CacheStage ──► Transport
//!                                         (coalesce,
//!                                          cache read/write)
//! ```
//!
//! - [`cache`]: ephemeral (moka) and persistent (disk) response caches,
//!   cache keys, freshness and the background expiry sweeper
//! - [`coalesce`]: in-flight registry that keeps duplicate requests off the wire
//! - [`retry`]: bounded, fixed-delay retry of 429/5xx responses
//! - [`cancel`]: cancel tokens and the timeout supervisor
//! - [`pipeline`]: the ordered middleware stages
//! - [`client`]: the caller-facing [`Client`]
//! - [`config`]: [`ClientConfig`] and its INI file
//!
//! # Example
//!
//! ```ignore
//! use skyfetch::{CacheConfig, Client, ClientConfig, RequestOptions};
//!
//! let client = Client::start(ClientConfig::default()).await?;
//! let options = RequestOptions::new().with_cache(CacheConfig::expires_in(1800));
//! let response = client
//!     .get("https://tiles.example.com/layer", &[("z", "12")], options)
//!     .await?;
//! client.shutdown().await;
//! ```

pub mod cache;
pub mod cancel;
pub mod client;
pub mod coalesce;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod telemetry;

pub use cache::{CacheConfig, CacheTarget};
pub use cancel::{CancelReason, CancelToken, Supervisor};
pub use client::{Client, RequestOptions};
pub use config::{ClientConfig, ConfigError};
pub use error::FetchError;
pub use http::{Method, Request, RequestBody, Response, ResponseBody, ResponseType};
