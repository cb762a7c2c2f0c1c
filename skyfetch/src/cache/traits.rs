//! Core traits for response cache backends.
//!
//! The `CacheBackend` trait provides a uniform key-value interface over the
//! ephemeral and persistent response caches. Backends store whole
//! [`CacheEntry`] values under opaque string keys and know nothing about
//! freshness; that policy lives in [`crate::cache::entry`].
//!
//! # Design Principles
//!
//! - **String keys**: `<url>?<query-or-body-hash>`, human-readable in logs
//! - **Whole entries**: body, status and headers travel together
//! - **Fallible**: every operation may fail; [`CacheStore`] downgrades
//!   failures so they never reach callers
//! - **Dyn-compatible**: methods return `futures::future::BoxFuture` for trait
//!   object support
//!
//! [`CacheEntry`]: crate::cache::CacheEntry
//! [`CacheStore`]: crate::cache::CacheStore

use futures::future::BoxFuture;
use thiserror::Error;

use crate::cache::CacheEntry;

/// Errors that can occur inside a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry could not be encoded for storage.
    #[error("Encode error: {0}")]
    Encode(String),

    /// A stored entry could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The backend is not usable on this host.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Uniform interface over response cache backends.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` for use across async tasks.
///
/// # Dyn Compatibility
///
/// This trait uses `Pin<Box<dyn Future>>` for async methods so the store
/// can hold backends as `Arc<dyn CacheBackend>`.
pub trait CacheBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Retrieve the entry stored under `key`, regardless of freshness.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<CacheEntry>, CacheError>>;

    /// Store `entry` under `key`, replacing any previous entry.
    fn set(&self, key: &str, entry: CacheEntry) -> BoxFuture<'_, Result<(), CacheError>>;

    /// Check if `key` exists without decoding the entry.
    fn has(&self, key: &str) -> BoxFuture<'_, Result<bool, CacheError>>;

    /// List every stored key.
    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, CacheError>>;

    /// Delete `key`.
    ///
    /// Returns `Ok(true)` if the key existed.
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, CacheError>>;

    /// Remove every entry.
    fn invalidate(&self) -> BoxFuture<'_, Result<(), CacheError>>;
}
