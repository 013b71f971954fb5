//! Provider registry and eligibility rules.

use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use till_store::{Provider, ProviderKind};

/// A configured provider together with its routing attributes.
pub struct RegisteredProvider {
    name: String,
    kind: ProviderKind,
    whitelist: Vec<Regex>,
    provider: Arc<dyn Provider>,
}

impl RegisteredProvider {
    /// Register a provider under a name with its key whitelist.
    ///
    /// An empty whitelist accepts every key.
    pub fn new(
        name: impl Into<String>,
        kind: ProviderKind,
        whitelist: Vec<Regex>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            whitelist,
            provider,
        }
    }

    /// The provider's configured name, unique within a node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The provider's kind.
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// The provider implementation itself.
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Whether this provider's whitelist admits the key.
    pub fn accepts_key(&self, key: &str) -> bool {
        self.whitelist.is_empty() || self.whitelist.iter().any(|p| p.is_match(key))
    }

    /// Whether an explicit-filter token selects this provider.
    ///
    /// A token matches the provider's name or its kind token; the kind
    /// match is what lets a forwarded request address "every file/memory
    /// provider" on a peer without knowing their names.
    fn matches_filter(&self, token: &str) -> bool {
        token == self.name || token == self.kind.as_str()
    }
}

/// The ordered set of providers configured for a node.
///
/// Built once at startup and immutable afterwards; configuration order
/// is preserved because it decides which provider wins a read when the
/// same key exists on more than one.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider, keeping configuration order.
    ///
    /// A provider whose name is already taken is dropped: the first
    /// registration wins.
    pub fn register(&mut self, registered: RegisteredProvider) {
        if self.providers.iter().any(|p| p.name == registered.name) {
            warn!(
                name = %registered.name,
                "multiple providers share this name; later ones are not used"
            );
            return;
        }
        self.providers.push(registered);
    }

    /// The eligible provider subset for a request, in configured order.
    ///
    /// A provider is eligible iff its whitelist admits the key and the
    /// explicit filter, when present, selects it by name or kind.
    pub fn eligible<'a>(&'a self, key: &str, explicit: &[String]) -> Vec<&'a RegisteredProvider> {
        self.providers
            .iter()
            .filter(|p| p.accepts_key(key))
            .filter(|p| {
                explicit.is_empty() || explicit.iter().any(|token| p.matches_filter(token))
            })
            .collect()
    }

    /// All registered providers in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredProvider> {
        self.providers.iter()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
