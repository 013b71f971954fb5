//! JSON configuration for the till daemon.
//!
//! Configuration is read once at startup and immutable for the process
//! lifetime. Sources, in precedence order: the `--config` flag, inline
//! JSON in `TILL_CONFIG`, a path in `TILL_CONFIG_FILE`, and finally
//! `./config.json`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

use till_store::ProviderKind;

/// Top-level node configuration.
#[derive(Debug)]
pub struct NodeConfig {
    /// TCP port for the HTTP API.
    pub port: u16,
    /// Additional bind address; the daemon always listens on loopback.
    pub bind: String,
    /// Address other nodes would use to reach this one.
    pub public_address: String,
    /// Lifespan in seconds applied when a client sends `default`.
    pub default_lifespan: u64,
    /// Key-pattern overrides for the default lifespan. Earlier wins.
    pub lifespan_patterns: Vec<LifespanPattern>,
    /// Log level filter (e.g. `"info"`, `"debug"`); `RUST_LOG` overrides.
    pub log_level: String,
    /// Ordered provider descriptors.
    pub providers: Vec<ProviderConfig>,
}

/// Raw JSON shape: providers arrive as untyped values so a single
/// malformed or unrecognized descriptor is skipped with a warning
/// instead of sinking the whole configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct IncomingConfig {
    port: u16,
    bind: String,
    public_address: String,
    default_lifespan: u64,
    lifespan_patterns: Vec<LifespanPattern>,
    log_level: String,
    providers: Vec<serde_json::Value>,
}

impl Default for IncomingConfig {
    fn default() -> Self {
        Self {
            port: 8035,
            bind: String::new(),
            public_address: String::new(),
            default_lifespan: 86_400,
            lifespan_patterns: Vec::new(),
            log_level: "info".to_string(),
            providers: Vec::new(),
        }
    }
}

/// One `lifespan_patterns` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct LifespanPattern {
    /// Key regex the override applies to.
    pub pattern: String,
    /// Lifespan seconds for matching keys.
    pub seconds: u64,
}

/// A provider descriptor, discriminated by its `"type"` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// In-memory bounded store.
    Memory(MemorySection),
    /// Filesystem bounded store.
    File(FileSection),
    /// Forwarder to peer cache nodes.
    Cluster(ClusterSection),
}

/// Parameters for a `memory` provider.
#[derive(Debug, Deserialize)]
pub struct MemorySection {
    /// Provider name, unique within the node.
    pub name: String,
    /// Key whitelist patterns; empty accepts every key.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Item bound; `0` means unbounded.
    #[serde(default)]
    pub maxitems: u64,
}

/// Parameters for a `file` provider.
#[derive(Debug, Deserialize)]
pub struct FileSection {
    /// Provider name, unique within the node.
    pub name: String,
    /// Key whitelist patterns; empty accepts every key.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Backing directory.
    #[serde(default = "default_file_path")]
    pub path: PathBuf,
    /// Total value-byte bound; `0` means unbounded.
    #[serde(default)]
    pub maxsize: u64,
    /// Item bound; `0` means unbounded.
    #[serde(default)]
    pub maxitems: u64,
}

fn default_file_path() -> PathBuf {
    PathBuf::from("/var/cache/till")
}

/// Parameters for a `cluster` provider.
#[derive(Debug, Deserialize)]
pub struct ClusterSection {
    /// Provider name, unique within the node.
    pub name: String,
    /// Key whitelist patterns; empty accepts every key.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Peer cache nodes as `host:port`.
    #[serde(default)]
    pub servers: Vec<String>,
    /// Provider kinds a forwarded request may use on the peer.
    #[serde(default)]
    pub request_types: Vec<String>,
    /// Deadline for each forwarded call, in milliseconds.
    #[serde(default = "default_cluster_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_cluster_timeout_ms() -> u64 {
    2000
}

impl ProviderConfig {
    /// The descriptor's provider name.
    pub fn name(&self) -> &str {
        match self {
            Self::Memory(s) => &s.name,
            Self::File(s) => &s.name,
            Self::Cluster(s) => &s.name,
        }
    }

    /// The descriptor's provider kind.
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Memory(_) => ProviderKind::Memory,
            Self::File(_) => ProviderKind::File,
            Self::Cluster(_) => ProviderKind::Cluster,
        }
    }

    /// The descriptor's whitelist patterns.
    pub fn whitelist(&self) -> &[String] {
        match self {
            Self::Memory(s) => &s.whitelist,
            Self::File(s) => &s.whitelist,
            Self::Cluster(s) => &s.whitelist,
        }
    }
}

impl NodeConfig {
    /// Load configuration from the first available source.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::from_json_file(path);
        }
        if let Ok(inline) = std::env::var("TILL_CONFIG") {
            return Self::from_json(&inline).context("invalid TILL_CONFIG");
        }
        if let Ok(file) = std::env::var("TILL_CONFIG_FILE") {
            return Self::from_json_file(Path::new(&file));
        }
        Self::from_json_file(Path::new("./config.json"))
    }

    fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let incoming: IncomingConfig = serde_json::from_str(raw)?;

        let mut providers = Vec::new();
        for value in incoming.providers {
            match serde_json::from_value::<ProviderConfig>(value.clone()) {
                Ok(provider) => providers.push(provider),
                Err(e) => {
                    warn!(descriptor = %value, error = %e, "could not parse provider descriptor; skipping");
                }
            }
        }

        Ok(Self {
            port: incoming.port,
            bind: incoming.bind,
            public_address: incoming.public_address,
            default_lifespan: incoming.default_lifespan,
            lifespan_patterns: incoming.lifespan_patterns,
            log_level: incoming.log_level,
            providers,
        })
    }
}
