//! Validation errors for incoming requests.

/// A request failed validation before any provider was contacted.
///
/// The messages are part of the client-facing contract: they are
/// returned verbatim in the structured `400` error body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The object key contains characters outside the allowed set.
    #[error("Malformed object key. Must match regex /[a-zA-Z0-9_\\-.]+/.")]
    InvalidKey,

    /// A write arrived without a lifespan header.
    #[error("X-Till-Lifespan header must be provided.")]
    MissingLifespan,

    /// The lifespan header is neither `default` nor a non-negative integer.
    #[error("X-Till-Lifespan header is not a non-negative integer or 'default'.")]
    InvalidLifespan,

    /// The synchronization header is some literal other than `0` or `1`.
    #[error("X-Till-Synchronized header is not exactly 0 or 1.")]
    InvalidSynchronized,

    /// Metadata exceeds the 4095-byte limit.
    #[error("X-Till-Metadata header must not exceed 4095 bytes.")]
    MetadataTooLong,

    /// Metadata contains a newline character.
    #[error("X-Till-Metadata header must not contain newline characters.")]
    MetadataMalformed,
}
