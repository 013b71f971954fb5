//! In-memory object storage backend.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::StoreError;
use crate::object::StoredObject;
use crate::traits::Provider;

/// In-memory object store backed by a `RwLock<HashMap>`.
///
/// Bounded by item count: when an insert pushes the store past
/// `max_items`, the entry closest to expiry is evicted. Capacity
/// eviction may therefore remove an object before its lifespan ends,
/// but never keeps one past it — expired entries are dropped on read.
pub struct MemoryStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    max_items: u64,
}

impl MemoryStore {
    /// Create a new in-memory store holding at most `max_items` objects.
    ///
    /// A limit of `0` means unbounded.
    pub fn new(max_items: u64) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            max_items,
        }
    }

    /// Number of live entries (including not-yet-purged expired ones).
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_soonest_unlocked(map: &mut HashMap<String, StoredObject>) {
        let victim = map
            .iter()
            .min_by_key(|(_, obj)| obj.expires_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            debug!(%key, "evicting object over item limit");
            map.remove(&key);
        }
    }
}

#[async_trait::async_trait]
impl Provider for MemoryStore {
    async fn put(&self, key: &str, object: StoredObject) -> Result<(), StoreError> {
        let mut map = self.objects.write().expect("lock poisoned");
        debug!(%key, size = object.value.len(), "storing object in memory");
        map.insert(key.to_string(), object);

        if self.max_items > 0 {
            while map.len() as u64 > self.max_items {
                Self::evict_soonest_unlocked(&mut map);
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        {
            let map = self.objects.read().expect("lock poisoned");
            match map.get(key) {
                Some(obj) if !obj.is_expired() => return Ok(Some(obj.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // The entry exists but has expired: drop it under the write lock.
        let mut map = self.objects.write().expect("lock poisoned");
        if map.get(key).is_some_and(|obj| obj.is_expired()) {
            debug!(%key, "purging expired object");
            map.remove(key);
        }
        Ok(None)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).is_some_and(|obj| !obj.is_expired()))
    }
}
