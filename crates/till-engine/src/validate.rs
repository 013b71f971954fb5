//! Request field validation shared by the dispatcher and the HTTP layer.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ValidationError;

/// Longest metadata value a client may attach to an object, in bytes.
pub const MAX_METADATA_BYTES: usize = 4095;

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_\-.]+$").expect("static regex"))
}

/// Check that a key is a well-formed, path-segment-safe identifier.
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key_pattern().is_match(key) {
        Ok(())
    } else {
        Err(ValidationError::InvalidKey)
    }
}

/// Check the metadata side channel: at most [`MAX_METADATA_BYTES`] bytes
/// and free of newline characters.
pub fn validate_metadata(metadata: Option<&str>) -> Result<(), ValidationError> {
    let Some(metadata) = metadata else {
        return Ok(());
    };
    if metadata.len() > MAX_METADATA_BYTES {
        return Err(ValidationError::MetadataTooLong);
    }
    if metadata.contains('\n') || metadata.contains('\r') {
        return Err(ValidationError::MetadataMalformed);
    }
    Ok(())
}
