//! Integration test: write/read against a real node.
//!
//! Single node with a memory provider and a file provider, driven over
//! actual TCP with an HTTP client — the same way the daemon is used in
//! production.

use std::sync::Arc;
use std::time::Duration;

use till_integration_tests::{provider_entry, start_node};

use till_engine::ProviderRegistry;
use till_store::{FileStore, MemoryStore, ProviderKind};

async fn two_provider_node() -> (till_integration_tests::TestNode, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ProviderRegistry::new();
    registry.register(provider_entry(
        "test_memory",
        ProviderKind::Memory,
        Arc::new(MemoryStore::new(50)),
    ));
    registry.register(provider_entry(
        "test_file",
        ProviderKind::File,
        Arc::new(FileStore::new(dir.path(), 10, 1024 * 1024).unwrap()),
    ));
    (start_node(registry).await, dir)
}

#[tokio::test]
async fn test_synchronized_roundtrip_over_tcp() {
    let (node, _dir) = two_provider_node().await;
    let client = reqwest::Client::new();

    let data = vec!["test data"; 100].join("\n");
    let metadata = "bWV0YSBkYXRhCg==".repeat(100);

    let resp = client
        .post(node.object_url("roundtrip"))
        .header("X-Till-Lifespan", "default")
        .header("X-Till-Synchronized", "1")
        .header("X-Till-Metadata", metadata.clone())
        .body(data.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .get(node.object_url("roundtrip"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("X-Till-Metadata").unwrap().to_str().unwrap(),
        metadata
    );
    assert_eq!(resp.text().await.unwrap(), data);
}

#[tokio::test]
async fn test_provider_scoping_over_tcp() {
    let (node, _dir) = two_provider_node().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(node.object_url("scoped"))
        .header("X-Till-Lifespan", "default")
        .header("X-Till-Synchronized", "1")
        .header("X-Till-Providers", "test_memory")
        .body("scoped value")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Disjoint filter: the object is only on the memory provider.
    let resp = client
        .get(node.object_url("scoped"))
        .header("X-Till-Providers", "test_file")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Matching filter finds it.
    let resp = client
        .get(node.object_url("scoped"))
        .header("X-Till-Providers", "test_memory")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "scoped value");
}

#[tokio::test]
async fn test_asynchronous_write_becomes_visible_over_tcp() {
    let (node, _dir) = two_provider_node().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(node.object_url("async-obj"))
        .header("X-Till-Lifespan", "60")
        .body("async value")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);

    for _ in 0..100 {
        let resp = client
            .get(node.object_url("async-obj"))
            .send()
            .await
            .unwrap();
        if resp.status() == 200 {
            assert_eq!(resp.text().await.unwrap(), "async value");
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("asynchronous write never became visible");
}

#[tokio::test]
async fn test_validation_over_tcp() {
    let (node, _dir) = two_provider_node().await;
    let client = reqwest::Client::new();

    // Missing lifespan.
    let resp = client
        .post(node.object_url("invalid"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("X-Till-Lifespan"));

    // Bad synchronized literal.
    let resp = client
        .post(node.object_url("invalid"))
        .header("X-Till-Lifespan", "10")
        .header("X-Till-Synchronized", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
