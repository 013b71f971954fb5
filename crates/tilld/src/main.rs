//! `tilld` — the till object-cache daemon.
//!
//! Binary entrypoint that assembles the configured providers into a
//! running cache node serving the HTTP object API.
//!
//! # Usage
//!
//! ```text
//! tilld                          # config from TILL_CONFIG / TILL_CONFIG_FILE / ./config.json
//! tilld -c till.json             # config from an explicit file
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use regex::Regex;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use till_api::{ApiServer, ApiServerConfig};
use till_cluster::{ClusterConfig, ClusterStore};
use till_engine::{Dispatcher, LifespanRules, ProviderRegistry, RegisteredProvider};
use till_store::{FileStore, MemoryStore, Provider};

use config::{NodeConfig, ProviderConfig};

/// How often file providers sweep for expired objects.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "tilld", version, about = "till object-cache daemon")]
struct Cli {
    /// Path to a JSON config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log_level);

    let identifier = uuid::Uuid::new_v4().to_string();
    info!(%identifier, port = config.port, "initializing tilld");
    if !config.public_address.is_empty() {
        info!(public_address = %config.public_address, "node public address");
    }

    let registry = build_registry(&config);
    if registry.is_empty() {
        warn!("no providers configured; every read will miss and every write is a no-op");
    }
    let lifespans = build_lifespans(&config);
    let dispatcher = Arc::new(Dispatcher::new(registry, lifespans));

    // Bind before signaling readiness: liveness means the listener exists.
    let loopback = TcpListener::bind(("127.0.0.1", config.port))
        .await
        .with_context(|| format!("could not bind 127.0.0.1:{}", config.port))?;

    let secondary = match secondary_bind(&config) {
        Some(bind) => Some(
            TcpListener::bind((bind.as_str(), config.port))
                .await
                .with_context(|| format!("could not bind {}:{}", bind, config.port))?,
        ),
        None => None,
    };

    if let Some(listener) = secondary {
        let server = ApiServer::new(ApiServerConfig {
            dispatcher: dispatcher.clone(),
            identifier: identifier.clone(),
        });
        let addr = listener.local_addr();
        info!(addr = ?addr, "object API listening");
        tokio::spawn(async move {
            if let Err(e) = server.serve_on(listener).await {
                error!(error = %e, "secondary listener failed");
            }
        });
    }

    signal_ready();

    let server = ApiServer::new(ApiServerConfig {
        dispatcher,
        identifier,
    });
    info!(port = config.port, "object API listening on loopback");
    server
        .serve_with_shutdown(loopback, shutdown_signal())
        .await
        .context("object API server failed")?;

    info!("tilld stopped");
    Ok(())
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The extra bind address, when it is not already covered by loopback.
fn secondary_bind(config: &NodeConfig) -> Option<String> {
    let bind = config.bind.trim();
    if bind.is_empty() || bind == "127.0.0.1" || bind == "localhost" {
        None
    } else {
        Some(bind.to_string())
    }
}

/// Build the provider registry from configuration.
///
/// A descriptor that cannot be realized (bad whitelist pattern,
/// unusable backing path) is skipped with a warning so one broken
/// provider does not keep the node down.
fn build_registry(config: &NodeConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    for descriptor in &config.providers {
        let whitelist = match compile_whitelist(descriptor.whitelist()) {
            Ok(whitelist) => whitelist,
            Err(e) => {
                warn!(
                    name = descriptor.name(),
                    error = %e,
                    "invalid whitelist pattern; provider skipped"
                );
                continue;
            }
        };

        let provider: Arc<dyn Provider> = match descriptor {
            ProviderConfig::Memory(section) => Arc::new(MemoryStore::new(section.maxitems)),
            ProviderConfig::File(section) => {
                let store =
                    match FileStore::new(&section.path, section.maxitems, section.maxsize) {
                        Ok(store) => Arc::new(store),
                        Err(e) => {
                            warn!(
                                name = %section.name,
                                path = %section.path.display(),
                                error = %e,
                                "could not open file provider; provider skipped"
                            );
                            continue;
                        }
                    };
                store.clone().spawn_sweeper(SWEEP_INTERVAL);
                store
            }
            ProviderConfig::Cluster(section) => {
                let cluster = ClusterConfig {
                    peers: section.servers.clone(),
                    request_types: section.request_types.clone(),
                    timeout: Duration::from_millis(section.timeout_ms),
                };
                match ClusterStore::new(cluster) {
                    Ok(store) => Arc::new(store),
                    Err(e) => {
                        warn!(
                            name = %section.name,
                            error = %e,
                            "could not set up cluster provider; provider skipped"
                        );
                        continue;
                    }
                }
            }
        };

        info!(
            name = descriptor.name(),
            kind = %descriptor.kind(),
            "setting up provider"
        );
        registry.register(RegisteredProvider::new(
            descriptor.name(),
            descriptor.kind(),
            whitelist,
            provider,
        ));
    }

    registry
}

fn compile_whitelist(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}

/// Build lifespan rules from configuration.
fn build_lifespans(config: &NodeConfig) -> LifespanRules {
    let mut rules = LifespanRules::new(config.default_lifespan);
    for entry in &config.lifespan_patterns {
        match Regex::new(&entry.pattern) {
            Ok(pattern) => rules = rules.with_pattern(pattern, entry.seconds),
            Err(e) => warn!(
                pattern = %entry.pattern,
                error = %e,
                "invalid lifespan pattern; ignored"
            ),
        }
    }
    rules
}

/// Notify a supervising test harness that the listener is bound.
///
/// Sends a single UDP datagram to `127.0.0.1:$TEST_UDP_PORT`. The
/// transport is an external collaborator convention; the daemon does not
/// depend on anyone receiving it.
fn signal_ready() {
    let Ok(port) = std::env::var("TEST_UDP_PORT") else {
        return;
    };
    let result = std::net::UdpSocket::bind("127.0.0.1:0")
        .and_then(|socket| socket.send_to(b"connected", format!("127.0.0.1:{port}")));
    match result {
        Ok(_) => debug!(%port, "readiness datagram sent"),
        Err(e) => warn!(%port, error = %e, "could not send readiness datagram"),
    }
}

/// Resolve when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "could not install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutting down");
}
