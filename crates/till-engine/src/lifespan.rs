//! Lifespan resolution.
//!
//! Every write must carry a lifespan: either the literal token
//! `default`, which resolves through the node's lifespan rules, or a
//! non-negative number of seconds. The resolved value becomes an
//! absolute expiry deadline at write time; each provider enforces the
//! deadline independently.

use regex::Regex;
use tracing::debug;

use crate::error::ValidationError;

/// Per-node lifespan defaults: an ordered list of key-pattern overrides
/// consulted first, falling back to the node-wide default.
#[derive(Debug, Clone)]
pub struct LifespanRules {
    patterns: Vec<(Regex, u64)>,
    default_secs: u64,
}

impl LifespanRules {
    /// Rules with only a node-wide default.
    pub fn new(default_secs: u64) -> Self {
        Self {
            patterns: Vec::new(),
            default_secs,
        }
    }

    /// Add a key-pattern override. Earlier patterns win.
    pub fn with_pattern(mut self, pattern: Regex, seconds: u64) -> Self {
        self.patterns.push((pattern, seconds));
        self
    }

    /// The default lifespan for a key, honoring pattern overrides.
    pub fn default_for(&self, key: &str) -> u64 {
        for (pattern, seconds) in &self.patterns {
            if pattern.is_match(key) {
                debug!(%key, pattern = %pattern, seconds, "lifespan pattern matched");
                return *seconds;
            }
        }
        self.default_secs
    }
}

/// Resolve the client's lifespan input into seconds.
///
/// `default` is case-sensitive; any other input must parse as a base-10
/// non-negative integer. An absent header is rejected — a lifespan is
/// mandatory on every write.
pub fn resolve_lifespan(
    input: Option<&str>,
    key: &str,
    rules: &LifespanRules,
) -> Result<u64, ValidationError> {
    match input {
        None => Err(ValidationError::MissingLifespan),
        Some("default") => Ok(rules.default_for(key)),
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ValidationError::InvalidLifespan),
    }
}
