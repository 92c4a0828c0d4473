// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the store server and its HTTP client.
//!
//! Each test binds a real store server on an ephemeral port and talks to it
//! through `HttpStore`, the same path agents in separate processes use.

use futures::StreamExt;
use std::collections::BTreeMap;
use std::time::Duration;
use stigmergy_core::application::event_log::EventLog;
use stigmergy_core::application::lease_manager::LeaseManager;
use stigmergy_core::domain::agent::AgentId;
use stigmergy_core::domain::event::{Cursor, LogKind};
use stigmergy_core::domain::feedback::{Feedback, FeedbackType};
use stigmergy_core::domain::lease::LeaseKey;
use stigmergy_core::domain::node_config::StreamsConfig;
use stigmergy_core::domain::store::{
    FeedbackBus, SensorRegistry, StoreError, StoreHealth, StreamStore,
};
use stigmergy_core::infrastructure::http_store::HttpStore;
use stigmergy_core::infrastructure::in_memory_store::InMemoryStore;
use stigmergy_core::presentation::store_api;
use std::sync::Arc;

async fn spawn_server() -> (HttpStore, InMemoryStore) {
    let store = InMemoryStore::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = store_api::router(store.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let client = HttpStore::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    (client, store)
}

fn fields(agent: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("agentId".to_string(), agent.to_string())])
}

#[tokio::test]
async fn test_append_read_trim_over_http() {
    let (client, backing) = spawn_server().await;

    let first = client.append("warning_pheromones:eu", fields("s1")).await.unwrap();
    let second = client.append("warning_pheromones:eu", fields("s2")).await.unwrap();
    assert!(second > first);

    let batch = client
        .read("warning_pheromones:eu", Cursor::After(first), 10, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(batch.events.len(), 1);
    assert_eq!(batch.events[0].agent_id(), Some("s2"));
    assert_eq!(batch.last_seen, second);

    assert_eq!(client.trim("warning_pheromones:eu", 1, 100).await.unwrap(), 1);
    assert_eq!(backing.stream_len("warning_pheromones:eu"), 1);
}

#[tokio::test]
async fn test_blocking_read_wakes_on_append() {
    let (client, _) = spawn_server().await;
    let reader = client.clone();

    let handle = tokio::spawn(async move {
        reader
            .read("alert_pheromones:eu", Cursor::Latest, 10, Duration::from_secs(5))
            .await
            .unwrap()
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.append("alert_pheromones:eu", fields("agg-1")).await.unwrap();

    let batch = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("blocking read should wake on append")
        .unwrap();
    assert_eq!(batch.events.len(), 1);
    assert_eq!(batch.events[0].agent_id(), Some("agg-1"));
}

#[tokio::test]
async fn test_leases_are_exclusive_across_clients() {
    let (client, _) = spawn_server().await;
    let a = LeaseManager::new(Arc::new(client.clone()), AgentId::new("a"), Duration::from_secs(15));
    let b = LeaseManager::new(Arc::new(client), AgentId::new("b"), Duration::from_secs(15));
    let key = LeaseKey::new("lock:alert:1700000000000-0");

    assert!(a.acquire(&key).await);
    assert!(!b.acquire(&key).await);
    assert!(!b.release(&key).await);
    assert!(!b.extend(&key, None).await);
    assert!(a.extend(&key, None).await);
    assert!(a.release(&key).await);
    assert!(b.acquire(&key).await);
}

#[tokio::test]
async fn test_registry_over_http() {
    let (client, _) = spawn_server().await;
    client.register("eu", &AgentId::new("s1")).await.unwrap();
    client.register("eu", &AgentId::new("s2")).await.unwrap();
    client.register("eu", &AgentId::new("s1")).await.unwrap();
    assert_eq!(SensorRegistry::count(&client, "eu").await.unwrap(), 2);
    assert_eq!(SensorRegistry::count(&client, "us").await.unwrap(), 0);
}

#[tokio::test]
async fn test_feedback_subscription_over_sse() {
    let (client, _) = spawn_server().await;
    let agent = AgentId::new("sensor-7");

    let mut subscription = client.subscribe(&agent).await.unwrap();

    // the server subscribes before it starts streaming, so the publish is seen
    let delivered = client
        .publish(&agent, Feedback::new("42-0", FeedbackType::TruePositive))
        .await
        .unwrap();
    assert_eq!(delivered, 1);

    let received = tokio::time::timeout(Duration::from_secs(2), subscription.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.detection_id, "42-0");
    assert_eq!(received.feedback_type, FeedbackType::TruePositive);
}

#[tokio::test]
async fn test_event_log_over_http() {
    let (client, _) = spawn_server().await;
    let log = EventLog::new(
        Arc::new(client),
        StreamsConfig {
            block_ms: 100,
            ..StreamsConfig::default()
        },
    );

    log.append(LogKind::Warning, "eu", fields("s1")).await.unwrap();
    let batch = log
        .read_since(LogKind::Warning, "eu", Cursor::beginning())
        .await
        .unwrap();
    assert_eq!(batch.events.len(), 1);
    assert!(batch.events[0].timestamp_ms() > 0);

    let empty = log
        .read_since(LogKind::Warning, "eu", Cursor::After(batch.last_seen))
        .await
        .unwrap();
    assert!(empty.events.is_empty());
    assert_eq!(empty.last_seen, batch.last_seen);
}

#[tokio::test]
async fn test_stats_and_unreachable_store() {
    let (client, _) = spawn_server().await;
    client.append("s", fields("a")).await.unwrap();
    let stats = client.stats().await.unwrap();
    assert_eq!(stats.events, 1);

    // nothing listens on port 9 locally
    let down = HttpStore::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    assert!(matches!(down.stats().await, Err(StoreError::Unavailable(_))));
}
