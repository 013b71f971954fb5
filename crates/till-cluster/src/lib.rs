//! Cluster-forwarding provider.
//!
//! [`ClusterStore`] implements the [`Provider`] trait by relaying
//! requests to peer cache nodes over their HTTP API, making remote
//! clusters look like just another storage backend. Recursion across
//! nodes is bounded by the forwarder's request-type allowlist, which is
//! sent as the `X-Till-Providers` filter on every nested call: a peer's
//! own cluster provider is never named in it, so a forwarded request can
//! never be forwarded again.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use till_store::{now_unix, Provider, StoreError, StoredObject};

const LIFESPAN_HEADER: &str = "X-Till-Lifespan";
const SYNCHRONIZED_HEADER: &str = "X-Till-Synchronized";
const METADATA_HEADER: &str = "X-Till-Metadata";
const PROVIDERS_HEADER: &str = "X-Till-Providers";

/// Configuration for a [`ClusterStore`].
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Peer cache nodes, each addressed as `host:port`.
    pub peers: Vec<String>,
    /// Provider kinds a forwarded request may use on the peer
    /// (e.g. `["file", "memory"]`). Sent as `X-Till-Providers`.
    pub request_types: Vec<String>,
    /// Deadline applied to every outbound call.
    pub timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            request_types: Vec::new(),
            timeout: Duration::from_millis(2000),
        }
    }
}

/// Provider that forwards `put`/`get` to peer cache nodes over HTTP.
pub struct ClusterStore {
    peers: Vec<String>,
    forward_filter: Option<String>,
    client: reqwest::Client,
}

impl ClusterStore {
    /// Create a forwarder from its configuration.
    ///
    /// Every request issued by the returned store carries the configured
    /// timeout; a forwarded call is never left pending indefinitely.
    pub fn new(config: ClusterConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Upstream {
                message: e.to_string(),
            })?;
        let forward_filter = if config.request_types.is_empty() {
            None
        } else {
            Some(config.request_types.join(","))
        };
        Ok(Self {
            peers: config.peers,
            forward_filter,
            client,
        })
    }

    fn object_url(peer: &str, key: &str) -> String {
        format!("http://{peer}/api/v1/object/{key}")
    }

    fn map_send_error(e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout
        } else {
            StoreError::Upstream {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait::async_trait]
impl Provider for ClusterStore {
    /// Forward a synchronized put to every configured peer.
    ///
    /// All peers must accept the object for the forwarder to report
    /// success; the parent dispatch folds a peer failure in exactly like
    /// a local provider failure.
    async fn put(&self, key: &str, object: StoredObject) -> Result<(), StoreError> {
        for peer in &self.peers {
            let mut req = self
                .client
                .post(Self::object_url(peer, key))
                .header(LIFESPAN_HEADER, object.remaining_secs().to_string())
                .header(SYNCHRONIZED_HEADER, "1")
                .body(object.value.clone());
            if let Some(metadata) = &object.metadata {
                req = req.header(METADATA_HEADER, metadata.clone());
            }
            if let Some(filter) = &self.forward_filter {
                req = req.header(PROVIDERS_HEADER, filter.clone());
            }

            let resp = req.send().await.map_err(Self::map_send_error)?;
            if !resp.status().is_success() {
                return Err(StoreError::Upstream {
                    message: format!("peer {peer} answered {} to forwarded put", resp.status()),
                });
            }
            debug!(%key, peer = %peer, status = %resp.status(), "forwarded put");
        }
        Ok(())
    }

    /// Query peers in configured order, returning the first hit.
    ///
    /// A peer miss (404) or failure moves the scan to the next peer; a
    /// failure is only surfaced when no peer produced the object.
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        let mut last_error: Option<StoreError> = None;
        for peer in &self.peers {
            let mut req = self.client.get(Self::object_url(peer, key));
            if let Some(filter) = &self.forward_filter {
                req = req.header(PROVIDERS_HEADER, filter.clone());
            }

            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(%key, peer = %peer, error = %e, "peer unreachable during forwarded get");
                    last_error = Some(Self::map_send_error(e));
                    continue;
                }
            };

            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            if !resp.status().is_success() {
                warn!(%key, peer = %peer, status = %resp.status(), "peer error during forwarded get");
                last_error = Some(StoreError::Upstream {
                    message: format!("peer {peer} answered {} to forwarded get", resp.status()),
                });
                continue;
            }

            let metadata = resp
                .headers()
                .get(METADATA_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let value = resp.bytes().await.map_err(Self::map_send_error)?;
            debug!(%key, peer = %peer, size = value.len(), "forwarded get hit");
            // The peer owns the expiry deadline; an object it served is
            // live by definition at fetch time.
            return Ok(Some(StoredObject {
                value: Bytes::from(value),
                metadata,
                created_at: now_unix(),
                expires_at: u64::MAX,
            }));
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        // Peers expose no dedicated existence probe; a get that discards
        // the body is the probe.
        Ok(self.get(key).await?.is_some())
    }
}
