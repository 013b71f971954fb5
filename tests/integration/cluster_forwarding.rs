//! Integration test: cluster forwarding between real nodes.
//!
//! Two (or more) nodes on real TCP ports, one carrying a cluster
//! provider that forwards to the other. Covers write propagation, read
//! pull-through, recursion bounding, and degraded-peer behavior.

use std::sync::Arc;
use std::time::Duration;

use till_integration_tests::{provider_entry, start_node, TestNode};

use till_cluster::{ClusterConfig, ClusterStore};
use till_engine::ProviderRegistry;
use till_store::{MemoryStore, ProviderKind};

fn forwarder(peers: Vec<String>, request_types: Vec<&str>) -> ClusterStore {
    ClusterStore::new(ClusterConfig {
        peers,
        request_types: request_types.into_iter().map(String::from).collect(),
        timeout: Duration::from_millis(2000),
    })
    .unwrap()
}

/// A node with one local memory provider.
async fn memory_node() -> TestNode {
    let mut registry = ProviderRegistry::new();
    registry.register(provider_entry(
        "local_memory",
        ProviderKind::Memory,
        Arc::new(MemoryStore::new(0)),
    ));
    start_node(registry).await
}

/// A node with a local memory provider and a forwarder to `peer`.
async fn forwarding_node(peer: String) -> TestNode {
    let mut registry = ProviderRegistry::new();
    registry.register(provider_entry(
        "local_memory",
        ProviderKind::Memory,
        Arc::new(MemoryStore::new(0)),
    ));
    registry.register(provider_entry(
        "upstream",
        ProviderKind::Cluster,
        Arc::new(forwarder(vec![peer], vec!["file", "memory"])),
    ));
    start_node(registry).await
}

#[tokio::test]
async fn test_synchronized_write_propagates_to_peer() {
    let peer = memory_node().await;
    let writer = forwarding_node(peer.peer()).await;
    let client = reqwest::Client::new();

    let data = vec!["test data"; 100].join("\n");
    let resp = client
        .post(writer.object_url("propagated"))
        .header("X-Till-Lifespan", "default")
        .header("X-Till-Synchronized", "1")
        .header("X-Till-Metadata", "c2lkZSBjaGFubmVs")
        .body(data.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Visible on the writer's own node...
    let resp = client
        .get(writer.object_url("propagated"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // ...and on the peer it forwards to, metadata included.
    let resp = client
        .get(peer.object_url("propagated"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("X-Till-Metadata").unwrap().to_str().unwrap(),
        "c2lkZSBjaGFubmVs"
    );
    assert_eq!(resp.text().await.unwrap(), data);
}

#[tokio::test]
async fn test_read_pulls_through_forwarder() {
    let peer = memory_node().await;
    let reader = forwarding_node(peer.peer()).await;
    let client = reqwest::Client::new();

    // Store only on the peer.
    let resp = client
        .post(peer.object_url("remote-only"))
        .header("X-Till-Lifespan", "60")
        .header("X-Till-Synchronized", "1")
        .body("remote value")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // The reader's local provider misses; the forwarder finds it on the
    // peer, addressed by provider kind rather than name.
    let resp = client
        .get(reader.object_url("remote-only"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "remote value");
}

#[tokio::test]
async fn test_forwarding_cycles_are_bounded() {
    // Two nodes pointing their forwarders at each other. The forwarded
    // request's kind allowlist never names "cluster", so a peer's own
    // forwarder is not eligible for a forwarded request and the cycle
    // terminates after one hop.
    use till_engine::{Dispatcher, LifespanRules};
    use till_integration_tests::start_node_on;

    let listener_a = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr_a = listener_a.local_addr().unwrap();

    let node_b = forwarding_node(addr_a.to_string()).await;

    let mut registry = ProviderRegistry::new();
    registry.register(provider_entry(
        "local_memory",
        ProviderKind::Memory,
        Arc::new(MemoryStore::new(0)),
    ));
    registry.register(provider_entry(
        "upstream",
        ProviderKind::Cluster,
        Arc::new(forwarder(vec![node_b.peer()], vec!["memory"])),
    ));
    let dispatcher = Arc::new(Dispatcher::new(registry, LifespanRules::new(3600)));
    let node_a = start_node_on(listener_a, dispatcher);

    let client = reqwest::Client::new();
    let resp = tokio::time::timeout(
        Duration::from_secs(10),
        client.get(node_a.object_url("never-stored")).send(),
    )
    .await
    .expect("lookup must terminate")
    .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_unreachable_peer_fails_synchronized_write_with_report() {
    // Forwarder pointing at a dead port: connection refused.
    let node = forwarding_node("127.0.0.1:9".to_string()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(node.object_url("doomed"))
        .header("X-Till-Lifespan", "60")
        .header("X-Till-Synchronized", "1")
        .body("v")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);

    let report: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(report["local_memory"]["status"], "OK");
    let upstream_status = report["upstream"]["status"].as_str().unwrap();
    assert!(
        upstream_status == "ERROR" || upstream_status == "TIMEOUT",
        "unexpected status {upstream_status}"
    );

    // The healthy local provider kept its copy.
    let resp = client.get(node.object_url("doomed")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_unreachable_peer_degrades_reads_to_miss() {
    let node = forwarding_node("127.0.0.1:9".to_string()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(node.object_url("nowhere"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
