//! File-based object storage backend.
//!
//! Stores one value file per key under `{base}/files/{key}` and a JSON
//! metadata sidecar under `{base}/metadata/{key}.json` carrying the
//! expiry deadline, creation time, and client metadata.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::object::{now_unix, StoredObject};
use crate::traits::Provider;

/// On-disk metadata sidecar, one per stored object.
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    expires: u64,
    created: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    expires_at: u64,
    size: u64,
}

/// In-memory view of what is on disk, maintained so eviction decisions
/// never need a directory walk.
#[derive(Default)]
struct Index {
    entries: HashMap<String, IndexEntry>,
    total_bytes: u64,
}

/// File-based object store bounded by item count and total value bytes.
///
/// Writes are atomic: value and sidecar are written to a scratch
/// directory first, then renamed into place, so readers never observe a
/// half-written object. When a write pushes the store past either bound,
/// the entry closest to expiry is evicted until the store fits again.
/// Expired entries are dropped on read and purged periodically by the
/// sweeper task (see [`FileStore::spawn_sweeper`]).
pub struct FileStore {
    base_dir: PathBuf,
    max_items: u64,
    max_bytes: u64,
    index: RwLock<Index>,
}

impl FileStore {
    /// Open (or create) a file store rooted at the given directory.
    ///
    /// Rebuilds the in-memory index from any objects already on disk.
    /// Limits of `0` mean unbounded.
    pub fn new(
        base_dir: impl AsRef<Path>,
        max_items: u64,
        max_bytes: u64,
    ) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(base_dir.join("files"))?;
        std::fs::create_dir_all(base_dir.join("metadata"))?;
        // Scratch space for atomic writes. Anything left over is a
        // half-finished write from a previous run.
        let scratch = base_dir.join("tmp");
        if scratch.exists() {
            std::fs::remove_dir_all(&scratch)?;
        }
        std::fs::create_dir_all(&scratch)?;

        let store = Self {
            base_dir,
            max_items,
            max_bytes,
            index: RwLock::new(Index::default()),
        };
        store.rebuild_index()?;
        Ok(store)
    }

    /// Scan `files/` and load each object's sidecar into the index.
    fn rebuild_index(&self) -> Result<(), StoreError> {
        let mut index = self.index.write().expect("lock poisoned");
        for entry in std::fs::read_dir(self.base_dir.join("files"))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(key) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let sidecar = match std::fs::read(self.sidecar_path(&key))
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_slice::<Sidecar>(&raw).map_err(|e| e.to_string()))
            {
                Ok(s) => s,
                Err(e) => {
                    warn!(%key, error = %e, "skipping object with unreadable sidecar");
                    continue;
                }
            };
            let size = entry.metadata()?.len();
            index.entries.insert(
                key,
                IndexEntry {
                    expires_at: sidecar.expires,
                    size,
                },
            );
            index.total_bytes += size;
        }
        debug!(
            entries = index.entries.len(),
            total_bytes = index.total_bytes,
            "file store index rebuilt"
        );
        Ok(())
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.base_dir.join("files").join(key)
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.base_dir.join("metadata").join(format!("{key}.json"))
    }

    fn scratch_path(&self, name: &str) -> PathBuf {
        self.base_dir.join("tmp").join(name)
    }

    /// Number of indexed entries (including not-yet-purged expired ones).
    pub fn len(&self) -> usize {
        self.index.read().expect("lock poisoned").entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `data` to its final path via the scratch directory.
    async fn write_atomic(&self, scratch_name: &str, dest: &Path, data: &[u8]) -> Result<(), StoreError> {
        let tmp = self.scratch_path(scratch_name);
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, dest).await?;
        Ok(())
    }

    /// Delete an object's value and sidecar files, ignoring absence.
    async fn remove_files(&self, key: &str) {
        for path in [self.value_path(key), self.sidecar_path(key)] {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(%key, path = %path.display(), error = %e, "could not remove object file");
                }
            }
        }
    }

    /// Drop one entry from the index and schedule its files for removal.
    fn remove_from_index(index: &mut Index, key: &str) {
        if let Some(entry) = index.entries.remove(key) {
            index.total_bytes = index.total_bytes.saturating_sub(entry.size);
        }
    }

    /// Delete all expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = now_unix();
        let victims: Vec<String> = {
            let mut index = self.index.write().expect("lock poisoned");
            let victims: Vec<String> = index
                .entries
                .iter()
                .filter(|(_, e)| e.expires_at <= now)
                .map(|(k, _)| k.clone())
                .collect();
            for key in &victims {
                Self::remove_from_index(&mut index, key);
            }
            victims
        };
        for key in &victims {
            debug!(%key, "expiring object from file store");
            self.remove_files(key).await;
        }
        victims.len()
    }

    /// Spawn a background task purging expired objects every `interval`.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let removed = self.purge_expired().await;
                if removed > 0 {
                    debug!(removed, "file store sweep complete");
                }
            }
        })
    }
}

#[async_trait::async_trait]
impl Provider for FileStore {
    async fn put(&self, key: &str, object: StoredObject) -> Result<(), StoreError> {
        let sidecar = Sidecar {
            expires: object.expires_at,
            created: object.created_at,
            metadata: object.metadata.clone(),
        };
        let sidecar_raw = serde_json::to_vec(&sidecar).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        self.write_atomic(key, &self.value_path(key), &object.value)
            .await?;
        self.write_atomic(
            &format!("{key}.json"),
            &self.sidecar_path(key),
            &sidecar_raw,
        )
        .await?;

        let size = object.value.len() as u64;
        debug!(%key, size, path = %self.value_path(key).display(), "stored object to file");

        // Update the index and evict while over either bound.
        let victims: Vec<String> = {
            let mut index = self.index.write().expect("lock poisoned");
            if let Some(old) = index.entries.insert(
                key.to_string(),
                IndexEntry {
                    expires_at: object.expires_at,
                    size,
                },
            ) {
                index.total_bytes = index.total_bytes.saturating_sub(old.size);
            }
            index.total_bytes += size;

            let mut victims = Vec::new();
            loop {
                let over_items = self.max_items > 0 && index.entries.len() as u64 > self.max_items;
                let over_bytes = self.max_bytes > 0 && index.total_bytes > self.max_bytes;
                if !over_items && !over_bytes {
                    break;
                }
                let victim = index
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone());
                match victim {
                    Some(k) => {
                        Self::remove_from_index(&mut index, &k);
                        victims.push(k);
                    }
                    None => break,
                }
            }
            victims
        };
        for victim in &victims {
            debug!(key = %victim, "evicting object over store limits");
            self.remove_files(victim).await;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        let value = match tokio::fs::read(self.value_path(key)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let raw = tokio::fs::read(self.sidecar_path(key))
            .await
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        let sidecar: Sidecar =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        if sidecar.expires <= now_unix() {
            debug!(%key, "purging expired object on read");
            {
                let mut index = self.index.write().expect("lock poisoned");
                Self::remove_from_index(&mut index, key);
            }
            self.remove_files(key).await;
            return Ok(None);
        }

        Ok(Some(StoredObject {
            value: Bytes::from(value),
            metadata: sidecar.metadata,
            created_at: sidecar.created,
            expires_at: sidecar.expires,
        }))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match tokio::fs::read(self.sidecar_path(key)).await {
            Ok(raw) => {
                let sidecar: Sidecar =
                    serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
                        key: key.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(sidecar.expires > now_unix())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
