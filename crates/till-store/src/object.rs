//! Shared object and provider types.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Current wall-clock time as unix seconds.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A cached object as handed to and returned by providers.
///
/// `value` is a [`Bytes`] handle so fan-out to several providers shares
/// one buffer. An object whose `expires_at` is in the past must be
/// indistinguishable from a missing object to every reader; each provider
/// enforces that on its own read path.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// The raw object payload.
    pub value: Bytes,
    /// Optional client-supplied metadata (at most 4095 bytes, no newline).
    pub metadata: Option<String>,
    /// Unix seconds at which the object was written.
    pub created_at: u64,
    /// Unix seconds after which the object no longer exists.
    pub expires_at: u64,
}

impl StoredObject {
    /// Create an object expiring `lifespan_secs` from now.
    pub fn new(value: Bytes, metadata: Option<String>, lifespan_secs: u64) -> Self {
        let now = now_unix();
        Self {
            value,
            metadata,
            created_at: now,
            expires_at: now.saturating_add(lifespan_secs),
        }
    }

    /// Whether the object has outlived its lifespan.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= now_unix()
    }

    /// Seconds until expiry, saturating at zero.
    pub fn remaining_secs(&self) -> u64 {
        self.expires_at.saturating_sub(now_unix())
    }
}

/// The three provider variants a node can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// In-memory bounded store.
    Memory,
    /// Filesystem bounded store.
    File,
    /// Forwarder to peer cache nodes.
    Cluster,
}

impl ProviderKind {
    /// The lowercase token used in configuration and provider filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
