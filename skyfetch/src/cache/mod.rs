//! Response caching.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  CacheStore                     │
//! │  select(targets) → first usable CacheHandle     │
//! │  failures logged and downgraded to miss/no-op   │
//! └──────────┬──────────────────────────┬───────────┘
//!            ▼                          ▼
//! ┌─────────────────────┐    ┌─────────────────────┐
//! │   MemoryBackend     │    │    DiskBackend      │
//! │   (moka, always)    │    │ (probed at startup) │
//! └─────────────────────┘    └─────────────────────┘
//! ```
//!
//! Keys come from [`cache_key`]; freshness is a header on each
//! [`CacheEntry`]; [`ExpirySweeper`] evicts stale entries in the background.

mod config;
mod entry;
mod key;
pub mod providers;
mod store;
mod sweeper;
mod traits;

pub use config::{CacheConfig, CacheTarget};
pub use entry::{now_millis, CacheEntry, FRESHNESS_HEADER};
pub use key::{cache_key, legacy_hash, BodyHasher};
pub use store::{CacheHandle, CacheStore};
pub use sweeper::{ExpirySweeper, SweepReport, DEFAULT_SWEEP_INTERVAL_SECS};
pub use traits::{CacheBackend, CacheError};

#[cfg(test)]
pub(crate) use store::tests::BrokenBackend;
