//! Storage provider trait and backend implementations.
//!
//! This crate defines the [`Provider`] trait for storing and retrieving
//! cached objects, along with the two local backends:
//!
//! - [`MemoryStore`] — in-memory storage backed by a `RwLock<HashMap>`,
//!   bounded by item count.
//! - [`FileStore`] — file-based storage with one value file and one JSON
//!   metadata sidecar per key, bounded by item count and total size.
//!
//! The third provider kind, the cluster forwarder, lives in the
//! `till-cluster` crate; it implements the same trait over HTTP.

mod error;
mod file_store;
mod memory_store;
mod object;
mod traits;

pub use error::StoreError;
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use object::{now_unix, ProviderKind, StoredObject};
pub use traits::Provider;
