//! Error types for provider storage operations.

/// Errors that can occur during provider storage operations.
///
/// "Object not found" is not an error: `get` returns `Ok(None)` and
/// `exists` returns `Ok(false)` for missing or expired objects.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An object's on-disk metadata sidecar could not be read or parsed.
    ///
    /// The object is treated as missing by readers; the entry should be
    /// purged rather than served.
    #[error("corrupt metadata for object {key}: {message}")]
    Corrupt {
        /// The object key whose sidecar is unreadable.
        key: String,
        /// What went wrong while reading it.
        message: String,
    },

    /// A remote peer rejected or failed a forwarded request.
    #[error("upstream error: {message}")]
    Upstream {
        /// Description of the upstream failure.
        message: String,
    },

    /// An outbound call exceeded its deadline.
    #[error("request timed out")]
    Timeout,
}
