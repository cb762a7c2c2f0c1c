//! Backend registry and failure isolation.
//!
//! [`CacheStore`] owns every backend the client was started with and picks
//! one per call ("first usable target"). All reads and writes go through a
//! [`CacheHandle`], which logs backend failures and downgrades them:
//!
//! - read failure → miss
//! - write/delete failure → no-op
//!
//! Nothing past this module ever sees a [`CacheError`].
//!
//! [`CacheError`]: crate::cache::CacheError

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::entry::now_millis;
use crate::cache::traits::CacheBackend;
use crate::cache::{CacheEntry, CacheTarget};

/// A selected backend with failure downgrading.
#[derive(Clone)]
pub struct CacheHandle {
    target: CacheTarget,
    backend: Arc<dyn CacheBackend>,
}

impl CacheHandle {
    pub fn new(target: CacheTarget, backend: Arc<dyn CacheBackend>) -> Self {
        Self { target, backend }
    }

    /// The target this handle writes to.
    pub fn target(&self) -> CacheTarget {
        self.target
    }

    /// Reads `key`, regardless of freshness.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.backend.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(backend = self.backend.name(), key = %key, error = %e, "Cache get failed");
                None
            }
        }
    }

    /// Reads `key` if present and fresh at `now_ms`; stale entries are misses.
    pub async fn get_fresh_at(&self, key: &str, now_ms: i64) -> Option<CacheEntry> {
        let entry = self.get(key).await?;
        if entry.is_fresh_at(now_ms) {
            Some(entry)
        } else {
            debug!(backend = self.backend.name(), key = %key, "Cache entry expired");
            None
        }
    }

    /// Reads `key` if present and fresh now.
    pub async fn get_fresh(&self, key: &str) -> Option<CacheEntry> {
        self.get_fresh_at(key, now_millis()).await
    }

    /// Returns `true` if a fresh entry exists for `key`.
    pub async fn has_fresh(&self, key: &str) -> bool {
        match self.backend.has(key).await {
            Ok(true) => self.get_fresh(key).await.is_some(),
            Ok(false) => false,
            Err(e) => {
                warn!(backend = self.backend.name(), key = %key, error = %e, "Cache has failed");
                false
            }
        }
    }

    /// Stores `entry` under `key`.
    pub async fn put(&self, key: &str, entry: CacheEntry) {
        if let Err(e) = self.backend.set(key, entry).await {
            warn!(backend = self.backend.name(), key = %key, error = %e, "Cache set failed");
        }
    }

    /// Deletes `key`, returning `true` if it existed.
    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(backend = self.backend.name(), key = %key, error = %e, "Cache delete failed");
                false
            }
        }
    }

    /// Lists stored keys; a failing backend lists nothing.
    pub async fn keys(&self) -> Vec<String> {
        match self.backend.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "Cache key listing failed");
                Vec::new()
            }
        }
    }

    /// Removes every entry; returns `false` if the backend failed.
    pub async fn invalidate(&self) -> bool {
        match self.backend.invalidate().await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "Cache invalidation failed");
                false
            }
        }
    }
}

/// Every backend available to a client, in registration order.
pub struct CacheStore {
    backends: Vec<CacheHandle>,
}

impl CacheStore {
    /// Creates a store with the always-available ephemeral backend.
    pub fn new(memory: Arc<dyn CacheBackend>) -> Self {
        Self {
            backends: vec![CacheHandle::new(CacheTarget::Memory, memory)],
        }
    }

    /// Registers the persistent backend.
    pub fn with_persistent(mut self, disk: Arc<dyn CacheBackend>) -> Self {
        self.backends.retain(|h| h.target != CacheTarget::Disk);
        self.backends.push(CacheHandle::new(CacheTarget::Disk, disk));
        self
    }

    /// Returns `true` if `target` was registered.
    pub fn is_available(&self, target: CacheTarget) -> bool {
        self.handle(target).is_some()
    }

    /// Targets registered with this store.
    pub fn available_targets(&self) -> Vec<CacheTarget> {
        self.backends.iter().map(|h| h.target).collect()
    }

    /// Handle for `target`, if registered.
    pub fn handle(&self, target: CacheTarget) -> Option<&CacheHandle> {
        self.backends.iter().find(|h| h.target == target)
    }

    /// Every registered handle.
    pub fn handles(&self) -> &[CacheHandle] {
        &self.backends
    }

    /// Returns the first usable target from `preferences`.
    ///
    /// Falls back to the ephemeral backend when nothing was requested or
    /// nothing requested is available.
    pub fn select(&self, preferences: &[CacheTarget]) -> CacheHandle {
        preferences
            .iter()
            .find_map(|target| self.handle(*target))
            .or_else(|| self.handle(CacheTarget::Memory))
            .unwrap_or(&self.backends[0])
            .clone()
    }

    /// Clears the requested backends, or all of them when `targets` is `None`.
    ///
    /// Only the named targets are touched. Returns how many backends were
    /// cleared.
    pub async fn invalidate(&self, targets: Option<&[CacheTarget]>) -> usize {
        let mut cleared = 0;
        for handle in &self.backends {
            let requested = targets.map_or(true, |t| t.contains(&handle.target));
            if requested && handle.invalidate().await {
                cleared += 1;
            }
        }
        cleared
    }
}
