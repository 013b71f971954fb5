//! Request dispatch: the write and read protocols.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use till_store::{Provider, StoreError, StoredObject};

use crate::error::ValidationError;
use crate::lifespan::{resolve_lifespan, LifespanRules};
use crate::registry::ProviderRegistry;
use crate::validate::validate_metadata;

/// Deadline applied to each provider call unless overridden.
const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(2);

/// An incoming write, with header values still in wire form.
///
/// Validation happens inside [`Dispatcher::put`] so that every caller
/// (HTTP layer, tests) gets identical semantics.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Object key.
    pub key: String,
    /// Raw value bytes.
    pub value: Bytes,
    /// Raw `X-Till-Lifespan` value, if the header was present.
    pub lifespan: Option<String>,
    /// Raw `X-Till-Synchronized` value, if the header was present.
    pub synchronized: Option<String>,
    /// Raw `X-Till-Metadata` value, if the header was present.
    pub metadata: Option<String>,
    /// Parsed `X-Till-Providers` filter; empty means no narrowing.
    pub providers: Vec<String>,
}

/// Per-provider outcome inside a [`ProviderReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProviderStatus {
    /// The provider stored the object.
    Ok,
    /// The provider failed.
    Error,
    /// The provider did not answer within its deadline.
    Timeout,
}

/// One provider's result in machine-readable form.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderResult {
    /// Outcome class.
    pub status: ProviderStatus,
    /// Failure detail, present for `ERROR` entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-provider results of a synchronized write, keyed by provider name.
///
/// Serialized verbatim as the response body when a synchronized write
/// fails, so callers can branch on individual provider outcomes instead
/// of parsing prose.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ProviderReport {
    results: BTreeMap<String, ProviderResult>,
}

impl ProviderReport {
    fn record_ok(&mut self, name: &str) {
        self.results.insert(
            name.to_string(),
            ProviderResult {
                status: ProviderStatus::Ok,
                error: None,
            },
        );
    }

    fn record_failure(&mut self, name: &str, error: &StoreError) {
        let result = match error {
            StoreError::Timeout => ProviderResult {
                status: ProviderStatus::Timeout,
                error: None,
            },
            other => ProviderResult {
                status: ProviderStatus::Error,
                error: Some(other.to_string()),
            },
        };
        self.results.insert(name.to_string(), result);
    }

    fn record_timeout(&mut self, name: &str) {
        self.results.insert(
            name.to_string(),
            ProviderResult {
                status: ProviderStatus::Timeout,
                error: None,
            },
        );
    }

    /// Whether every recorded provider succeeded.
    pub fn all_ok(&self) -> bool {
        self.results
            .values()
            .all(|r| r.status == ProviderStatus::Ok)
    }

    /// Look up one provider's result by name.
    pub fn get(&self, name: &str) -> Option<&ProviderResult> {
        self.results.get(name)
    }
}

/// Outcome of a dispatched write.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The write was queued (asynchronous mode) or there was nothing to
    /// store (no eligible provider — a routing miss on write is the
    /// caller's configuration concern, not an error).
    Accepted,
    /// Every targeted provider confirmed the synchronized write.
    Created,
    /// At least one provider failed a synchronized write.
    Failed(ProviderReport),
}

/// The routing engine: selects eligible providers for each request and
/// executes the write or read protocol against them.
///
/// Holds only read-only state ([`ProviderRegistry`], [`LifespanRules`]),
/// so a single instance is shared across all connections.
pub struct Dispatcher {
    registry: ProviderRegistry,
    lifespans: LifespanRules,
    provider_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher over a fixed registry and lifespan rules.
    pub fn new(registry: ProviderRegistry, lifespans: LifespanRules) -> Self {
        Self {
            registry,
            lifespans,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Override the per-provider deadline.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// The provider registry backing this dispatcher.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Execute the write protocol.
    ///
    /// Validation order is fixed: lifespan, then synchronization flag,
    /// then metadata — the first failure wins.
    pub async fn put(&self, request: WriteRequest) -> Result<WriteOutcome, ValidationError> {
        let lifespan = resolve_lifespan(request.lifespan.as_deref(), &request.key, &self.lifespans)?;

        let synchronized = match request.synchronized.as_deref() {
            None => false,
            Some("0") => false,
            Some("1") => true,
            Some(_) => return Err(ValidationError::InvalidSynchronized),
        };

        validate_metadata(request.metadata.as_deref())?;

        let eligible = self.registry.eligible(&request.key, &request.providers);
        if eligible.is_empty() {
            debug!(key = %request.key, "no eligible provider for write; accepting as no-op");
            return Ok(WriteOutcome::Accepted);
        }

        let targets: Vec<(String, Arc<dyn Provider>)> = eligible
            .iter()
            .map(|p| (p.name().to_string(), Arc::clone(p.provider())))
            .collect();
        let object = StoredObject::new(request.value, request.metadata, lifespan);

        if synchronized {
            Ok(self.put_synchronized(&request.key, object, targets).await)
        } else {
            self.put_detached(&request.key, object, targets);
            Ok(WriteOutcome::Accepted)
        }
    }

    /// Fan out to every target and wait for all of them.
    async fn put_synchronized(
        &self,
        key: &str,
        object: StoredObject,
        targets: Vec<(String, Arc<dyn Provider>)>,
    ) -> WriteOutcome {
        let mut handles = Vec::with_capacity(targets.len());
        for (name, provider) in targets {
            let key = key.to_string();
            let object = object.clone();
            let deadline = self.provider_timeout;
            let handle =
                tokio::spawn(
                    async move { tokio::time::timeout(deadline, provider.put(&key, object)).await },
                );
            handles.push((name, handle));
        }

        let mut report = ProviderReport::default();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(Ok(()))) => report.record_ok(&name),
                Ok(Ok(Err(e))) => {
                    warn!(provider = %name, %key, error = %e, "synchronized write failed");
                    report.record_failure(&name, &e);
                }
                Ok(Err(_elapsed)) => {
                    warn!(provider = %name, %key, "synchronized write timed out");
                    report.record_timeout(&name);
                }
                Err(e) => {
                    warn!(provider = %name, %key, error = %e, "synchronized write task failed");
                    report.record_failure(
                        &name,
                        &StoreError::Upstream {
                            message: e.to_string(),
                        },
                    );
                }
            }
        }

        if report.all_ok() {
            WriteOutcome::Created
        } else {
            WriteOutcome::Failed(report)
        }
    }

    /// Hand the write to detached background tasks and return at once.
    ///
    /// Failures never reach the original caller: fire-and-forget is the
    /// contract of the asynchronous mode, trading durability feedback
    /// for latency. They are still logged for operators.
    fn put_detached(
        &self,
        key: &str,
        object: StoredObject,
        targets: Vec<(String, Arc<dyn Provider>)>,
    ) {
        for (name, provider) in targets {
            let key = key.to_string();
            let object = object.clone();
            let deadline = self.provider_timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(deadline, provider.put(&key, object)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(provider = %name, %key, error = %e, "asynchronous write failed")
                    }
                    Err(_) => warn!(provider = %name, %key, "asynchronous write timed out"),
                }
            });
        }
    }

    /// Execute the read protocol: scan eligible providers sequentially,
    /// in configured order, returning the first hit.
    ///
    /// The scan order is a precedence rule, not an optimization: an
    /// earlier-configured provider shadows later ones. A provider error
    /// or timeout only removes that provider from the scan — one
    /// unhealthy provider must not hide an object a healthy sibling
    /// still holds.
    pub async fn get(&self, key: &str, explicit: &[String]) -> Option<StoredObject> {
        for registered in self.registry.eligible(key, explicit) {
            let attempt =
                tokio::time::timeout(self.provider_timeout, registered.provider().get(key)).await;
            match attempt {
                Ok(Ok(Some(object))) => {
                    debug!(provider = %registered.name(), %key, "read hit");
                    return Some(object);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!(provider = %registered.name(), %key, error = %e, "provider error during read; continuing scan");
                }
                Err(_) => {
                    warn!(provider = %registered.name(), %key, "provider timed out during read; continuing scan");
                }
            }
        }
        None
    }
}
