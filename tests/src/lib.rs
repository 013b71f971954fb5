//! Shared test harness for till integration tests.
//!
//! Starts real cache nodes on ephemeral loopback ports so tests can
//! exercise the full stack — HTTP parsing, dispatch, providers, and
//! nested cluster forwarding — over actual TCP connections.

use std::net::SocketAddr;
use std::sync::Arc;

use regex::Regex;

use till_api::{ApiServer, ApiServerConfig};
use till_engine::{Dispatcher, LifespanRules, ProviderRegistry, RegisteredProvider};
use till_store::{Provider, ProviderKind};

/// A running cache node bound to an ephemeral loopback port.
///
/// The server task is aborted when the node is dropped.
pub struct TestNode {
    /// The node's bound address.
    pub addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl TestNode {
    /// The `host:port` form used in cluster provider configuration.
    pub fn peer(&self) -> String {
        self.addr.to_string()
    }

    /// Full URL of an object on this node.
    pub fn object_url(&self, key: &str) -> String {
        format!("http://{}/api/v1/object/{key}", self.addr)
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A registry entry with an accept-everything whitelist.
pub fn provider_entry(
    name: &str,
    kind: ProviderKind,
    provider: Arc<dyn Provider>,
) -> RegisteredProvider {
    let whitelist = vec![Regex::new(".*").expect("static regex")];
    RegisteredProvider::new(name, kind, whitelist, provider)
}

/// Start a node over the given registry with a 3600 s default lifespan.
pub async fn start_node(registry: ProviderRegistry) -> TestNode {
    let dispatcher = Arc::new(Dispatcher::new(registry, LifespanRules::new(3600)));
    start_node_with(dispatcher).await
}

/// Start a node over a fully configured dispatcher.
pub async fn start_node_with(dispatcher: Arc<Dispatcher>) -> TestNode {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    start_node_on(listener, dispatcher)
}

/// Start a node on an already-bound listener.
///
/// Binding the listener up front lets a test wire two nodes into a
/// cycle: the first node's address is known before the second exists.
pub fn start_node_on(
    listener: tokio::net::TcpListener,
    dispatcher: Arc<Dispatcher>,
) -> TestNode {
    let addr = listener.local_addr().expect("local addr");

    let server = ApiServer::new(ApiServerConfig {
        dispatcher,
        identifier: format!("test-node-{addr}"),
    });
    let handle = tokio::spawn(async move {
        server.serve_on(listener).await.ok();
    });

    TestNode { addr, handle }
}
