//! Persistent on-disk backend.
//!
//! Each entry lives in its own file named after the SHA-256 of its key:
//!
//! ```text
//! <cache_dir>/
//!   ├── 3f5a…c1.entry     bincode-encoded StoredEntry
//!   └── 9b0e…77.entry
//! ```
//!
//! JSON bodies are stringified before storage and parsed back on read,
//! text is stored as UTF-8 and binary bodies byte-for-byte. Writes go to a
//! temporary file first and are renamed into place so readers never see a
//! partial entry.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::traits::{CacheBackend, CacheError};
use crate::cache::CacheEntry;
use crate::http::{Headers, ResponseBody};

const ENTRY_EXTENSION: &str = "entry";
const PROBE_FILE: &str = ".probe";

#[derive(Debug, Serialize, Deserialize)]
enum StoredKind {
    Json,
    Text,
    Bytes,
}

/// On-disk representation of a [`CacheEntry`].
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    kind: StoredKind,
    body: Vec<u8>,
    status: u16,
    status_text: String,
    headers: Headers,
}

impl StoredEntry {
    fn encode(entry: &CacheEntry) -> Result<Vec<u8>, CacheError> {
        let (kind, body) = match &entry.body {
            ResponseBody::Json(value) => (
                StoredKind::Json,
                serde_json::to_vec(value).map_err(|e| CacheError::Encode(e.to_string()))?,
            ),
            ResponseBody::Text(text) => (StoredKind::Text, text.as_bytes().to_vec()),
            ResponseBody::Bytes(bytes) => (StoredKind::Bytes, bytes.to_vec()),
        };
        let stored = StoredEntry {
            key: entry.key.clone(),
            kind,
            body,
            status: entry.status,
            status_text: entry.status_text.clone(),
            headers: entry.headers.clone(),
        };
        bincode::serialize(&stored).map_err(|e| CacheError::Encode(e.to_string()))
    }

    fn decode(data: &[u8]) -> Result<CacheEntry, CacheError> {
        let stored: StoredEntry =
            bincode::deserialize(data).map_err(|e| CacheError::Decode(e.to_string()))?;
        let stored_len = stored.body.len();
        let body = match stored.kind {
            StoredKind::Json => ResponseBody::Json(
                serde_json::from_slice(&stored.body).map_err(|e| CacheError::Decode(e.to_string()))?,
            ),
            StoredKind::Text => ResponseBody::Text(
                String::from_utf8(stored.body).map_err(|e| CacheError::Decode(e.to_string()))?,
            ),
            StoredKind::Bytes => ResponseBody::Bytes(Bytes::from(stored.body)),
        };
        Ok(CacheEntry {
            key: stored.key,
            body_len: stored_len,
            body,
            status: stored.status,
            status_text: stored.status_text,
            headers: stored.headers,
        })
    }
}

/// Persistent cache backend rooted at a directory.
pub struct DiskBackend {
    directory: PathBuf,
    write_seq: AtomicU64,
}

impl DiskBackend {
    /// Opens the backend, probing that the directory is usable.
    ///
    /// The probe creates the directory and writes and removes a marker file.
    /// Any failure means the host offers no persistent cache.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| CacheError::Unavailable(format!("{}: {}", directory.display(), e)))?;

        let probe = directory.join(PROBE_FILE);
        tokio::fs::write(&probe, b"probe")
            .await
            .map_err(|e| CacheError::Unavailable(format!("{}: {}", probe.display(), e)))?;
        tokio::fs::remove_file(&probe).await?;

        debug!(directory = %directory.display(), "Disk cache available");
        Ok(Self {
            directory,
            write_seq: AtomicU64::new(0),
        })
    }

    /// Root directory of this cache.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
        self.directory.join(format!("{}.{}", digest, ENTRY_EXTENSION))
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut files = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.directory).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

impl CacheBackend for DiskBackend {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<CacheEntry>, CacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            match tokio::fs::read(&path).await {
                Ok(data) => StoredEntry::decode(&data).map(Some),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn set(&self, key: &str, entry: CacheEntry) -> BoxFuture<'_, Result<(), CacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            let data = StoredEntry::encode(&entry)?;
            let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
            let tmp = path.with_extension(format!("tmp{}", seq));
            tokio::fs::write(&tmp, &data).await?;
            if let Err(e) = tokio::fs::rename(&tmp, &path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e.into());
            }
            Ok(())
        })
    }

    fn has(&self, key: &str) -> BoxFuture<'_, Result<bool, CacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move { Ok(tokio::fs::try_exists(&path).await?) })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, CacheError>> {
        Box::pin(async move {
            let mut keys = Vec::new();
            for path in self.entry_files().await? {
                let decoded = match tokio::fs::read(&path).await {
                    Ok(data) => StoredEntry::decode(&data),
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => Err(e.into()),
                };
                match decoded {
                    Ok(entry) => keys.push(entry.key),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry"),
                }
            }
            Ok(keys)
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, CacheError>> {
        let path = self.entry_path(key);
        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn invalidate(&self) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            for path in self.entry_files().await? {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        })
    }
}
