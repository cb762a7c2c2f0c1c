//! Cache backend implementations.
//!
//! Each provider implements the `CacheBackend` trait. Providers are wired
//! into a [`CacheStore`](crate::cache::CacheStore) once, at client startup.
//!
//! # Available Providers
//!
//! - [`MemoryBackend`]: In-memory cache using moka, always available
//! - [`DiskBackend`]: On-disk cache, available if its directory probe succeeds

mod disk;
mod memory;

pub use disk::DiskBackend;
pub use memory::{MemoryBackend, DEFAULT_MEMORY_CACHE_BYTES};
