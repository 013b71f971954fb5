//! Core trait for object storage providers.

use crate::error::StoreError;
use crate::object::StoredObject;

/// Trait for storing and retrieving cached objects.
///
/// All implementations must be `Send + Sync` for use across async tasks.
/// Missing and expired objects are reported as `Ok(None)` / `Ok(false)`,
/// never as errors; errors mean the provider itself failed.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Store an object under the given key, replacing any previous value.
    async fn put(&self, key: &str, object: StoredObject) -> Result<(), StoreError>;

    /// Retrieve an object by key. Returns `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError>;

    /// Check whether a live (non-expired) object exists for the key.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}
