//! Ephemeral in-memory backend using moka.
//!
//! This provider wraps `moka::future::Cache` to provide an async-safe,
//! lock-free process-local response cache with size-bounded eviction.
//! It is always available and is the default target.
//!
//! Moka's own TTL is not used: expiry is carried per entry in the freshness
//! header so that every backend shares one freshness policy.

use futures::future::BoxFuture;
use moka::future::Cache as MokaCache;

use crate::cache::traits::{CacheBackend, CacheError};
use crate::cache::CacheEntry;

/// Default memory budget for cached responses (256 MB).
pub const DEFAULT_MEMORY_CACHE_BYTES: u64 = 256 * 1024 * 1024;

/// In-memory cache backend using moka.
pub struct MemoryBackend {
    cache: MokaCache<String, CacheEntry>,
    max_size_bytes: u64,
}

impl MemoryBackend {
    /// Create a new memory backend bounded by `max_size_bytes`.
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = MokaCache::builder()
            // Weight each entry by its key and payload size
            .weigher(|key: &String, entry: &CacheEntry| -> u32 {
                // moka uses u32 for weights, cap at u32::MAX for very large entries
                (key.len() + entry.body_len()).min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes)
            .build();

        Self {
            cache,
            max_size_bytes,
        }
    }

    /// Get the current weighted size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }

    /// Get the current number of entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CACHE_BYTES)
    }
}

impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<CacheEntry>, CacheError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.get(&key).await) })
    }

    fn set(&self, key: &str, entry: CacheEntry) -> BoxFuture<'_, Result<(), CacheError>> {
        let key = key.to_string();
        Box::pin(async move {
            self.cache.insert(key, entry).await;
            Ok(())
        })
    }

    fn has(&self, key: &str) -> BoxFuture<'_, Result<bool, CacheError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.contains_key(&key)) })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, CacheError>> {
        Box::pin(async move {
            Ok(self
                .cache
                .iter()
                .map(|(key, _)| key.as_ref().clone())
                .collect())
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, CacheError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.cache.remove(&key).await.is_some()) })
    }

    fn invalidate(&self) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            self.cache.invalidate_all();
            self.cache.run_pending_tasks().await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Headers, Response, ResponseBody};
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::Arc;

    fn entry(key: &str, body: ResponseBody) -> CacheEntry {
        let response = Response::new(200, "OK", Headers::new(), body);
        CacheEntry::from_response(key, &response, 60, 0)
    }

    #[tokio::test]
    async fn test_memory_backend_set_and_get() {
        let backend = MemoryBackend::default();
        let stored = entry("k1", ResponseBody::Json(json!({"a": [1, 2]})));

        backend.set("k1", stored.clone()).await.unwrap();

        assert_eq!(backend.get("k1").await.unwrap(), Some(stored));
        assert!(backend.has("k1").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_backend_get_missing() {
        let backend = MemoryBackend::default();
        assert!(backend.get("nonexistent").await.unwrap().is_none());
        assert!(!backend.has("nonexistent").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_backend_round_trips_every_shape() {
        let backend = MemoryBackend::default();
        let bodies = [
            ResponseBody::Json(json!({"layers": ["s2", "landsat"], "n": 2})),
            ResponseBody::Text("<Capabilities/>".to_string()),
            ResponseBody::Bytes(Bytes::from_static(&[0x89, b'P', b'N', b'G', 0, 255])),
        ];

        for (i, body) in bodies.into_iter().enumerate() {
            let key = format!("k{}", i);
            let stored = entry(&key, body);
            backend.set(&key, stored.clone()).await.unwrap();
            assert_eq!(backend.get(&key).await.unwrap(), Some(stored));
        }
    }

    #[tokio::test]
    async fn test_memory_backend_delete() {
        let backend = MemoryBackend::default();
        backend.set("k1", entry("k1", ResponseBody::Text("x".into()))).await.unwrap();

        assert!(backend.delete("k1").await.unwrap());
        assert!(!backend.has("k1").await.unwrap());
        assert!(!backend.delete("k1").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_backend_keys() {
        let backend = MemoryBackend::default();
        backend.set("a", entry("a", ResponseBody::Text("1".into()))).await.unwrap();
        backend.set("b", entry("b", ResponseBody::Text("2".into()))).await.unwrap();

        let mut keys = backend.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_backend_invalidate_is_idempotent() {
        let backend = MemoryBackend::default();
        backend.set("a", entry("a", ResponseBody::Text("1".into()))).await.unwrap();

        backend.invalidate().await.unwrap();
        assert!(backend.keys().await.unwrap().is_empty());

        backend.invalidate().await.unwrap();
        assert!(backend.keys().await.unwrap().is_empty());
        assert!(backend.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_backend_concurrent_access() {
        let backend = Arc::new(MemoryBackend::default());
        let mut handles = Vec::new();

        for i in 0..50 {
            let backend = Arc::clone(&backend);
            handles.push(tokio::spawn(async move {
                let key = format!("key{}", i);
                let stored = entry(&key, ResponseBody::Bytes(Bytes::from(vec![i as u8; 100])));

                backend.set(&key, stored.clone()).await.unwrap();
                assert_eq!(backend.get(&key).await.unwrap(), Some(stored));
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(backend.keys().await.unwrap().len(), 50);
    }
}
