// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Warning → alert → remediation across all three roles sharing one store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use stigmergy_core::application::event_log::EventLog;
use stigmergy_core::application::lease_manager::LeaseManager;
use stigmergy_core::domain::agent::AgentId;
use stigmergy_core::domain::event::{Cursor, LogKind};
use stigmergy_core::domain::events::DashboardEvent;
use stigmergy_core::domain::node_config::{AggregatorConfig, SensorConfig, StreamsConfig};
use stigmergy_core::domain::supervisor::{BackoffPolicy, BackoffSupervisor, PeriodicTask};
use stigmergy_core::infrastructure::event_bus::DashboardBus;
use stigmergy_core::infrastructure::in_memory_store::InMemoryStore;
use stigmergy_swarm::application::{AggregatorAgent, MetricSource, ResponderAgent, SensorAgent};
use stigmergy_swarm::domain::RemediationPlan;
use tokio_util::sync::CancellationToken;

struct Spike;

impl MetricSource for Spike {
    fn sample(&mut self) -> f64 {
        0.95
    }
}

struct Swarm {
    store: InMemoryStore,
    log: EventLog,
    bus: DashboardBus,
}

impl Swarm {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let log = EventLog::new(
            Arc::new(store.clone()),
            StreamsConfig {
                block_ms: 0,
                ..StreamsConfig::default()
            },
        );
        Self {
            store,
            log,
            bus: DashboardBus::new(256),
        }
    }

    fn sensor(&self, id: &str) -> SensorAgent {
        SensorAgent::new(AgentId::new(id), "eu", self.log.clone(), self.bus.clone(), &SensorConfig::default())
            .with_metric_source(Spike)
    }

    fn aggregator(&self) -> AggregatorAgent {
        let config = AggregatorConfig {
            total_sensors: Some(10),
            quorum_ratio: 0.7,
            ..AggregatorConfig::default()
        };
        AggregatorAgent::new(
            AgentId::new("agg-1"),
            "eu",
            self.log.clone(),
            self.bus.clone(),
            Arc::new(self.store.clone()),
            &config,
        )
        .starting_at(Cursor::beginning())
    }

    fn responder(&self, id: &str) -> ResponderAgent {
        let leases = LeaseManager::new(
            Arc::new(self.store.clone()),
            AgentId::new(id),
            Duration::from_secs(15),
        );
        ResponderAgent::new(
            "eu",
            self.log.clone(),
            self.bus.clone(),
            leases,
            RemediationPlan::new(Duration::from_secs(10), Duration::from_secs(2)),
            Duration::from_secs(30),
        )
        .starting_at(Cursor::beginning())
    }

    async fn inject(&self, agents: usize) {
        for i in 1..=agents {
            let fields = BTreeMap::from([("agentId".to_string(), format!("sensor-{}", i))]);
            self.log.append(LogKind::Warning, "eu", fields).await.unwrap();
        }
    }

    async fn alert_count(&self) -> usize {
        self.log
            .read_since(LogKind::Alert, "eu", Cursor::beginning())
            .await
            .unwrap()
            .events
            .len()
    }
}

fn count(events: &[DashboardEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

#[tokio::test]
async fn test_six_distinct_reporters_stay_below_quorum() {
    let swarm = Swarm::new();
    swarm.inject(6).await;

    let mut aggregator = swarm.aggregator();
    aggregator.tick().await.unwrap();
    assert_eq!(swarm.alert_count().await, 0);
}

#[tokio::test]
async fn test_sensors_escalate_to_a_single_alert() {
    let swarm = Swarm::new();
    let mut receiver = swarm.bus.subscribe();
    let mut aggregator = swarm.aggregator();

    for i in 1..=7 {
        swarm.sensor(&format!("sensor-{}", i)).tick().await.unwrap();
    }
    aggregator.tick().await.unwrap();
    aggregator.tick().await.unwrap();

    assert_eq!(swarm.alert_count().await, 1);
    let events = receiver.drain();
    assert_eq!(count(&events, "sensorPheromone"), 7);
    assert_eq!(count(&events, "aggregatorAlert"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_racing_responders_remediate_once() {
    let swarm = Swarm::new();
    let mut receiver = swarm.bus.subscribe();
    swarm.inject(7).await;
    swarm.aggregator().tick().await.unwrap();
    assert_eq!(swarm.alert_count().await, 1);

    let mut first = swarm.responder("responder-a");
    let mut second = swarm.responder("responder-b");
    let (a, b) = tokio::join!(first.tick(), second.tick());
    a.unwrap();
    b.unwrap();

    let events = receiver.drain();
    assert_eq!(count(&events, "responseStart"), 1);
    assert_eq!(count(&events, "responseComplete"), 1);

    let start = events.iter().position(|e| e.name() == "responseStart").unwrap();
    let complete = events.iter().position(|e| e.name() == "responseComplete").unwrap();
    assert!(start < complete);
}

#[tokio::test(start_paused = true)]
async fn test_supervised_swarm_end_to_end() {
    let swarm = Swarm::new();
    let mut receiver = swarm.bus.subscribe();
    swarm.inject(7).await;

    let shutdown = CancellationToken::new();
    let period = Duration::from_secs(1);
    let mut handles = Vec::new();

    let aggregator = swarm.aggregator();
    let token = shutdown.clone();
    handles.push(tokio::spawn(async move {
        let supervisor = BackoffSupervisor::new(BackoffPolicy::default());
        supervisor.run(aggregator, period, token).await
    }));
    for id in ["responder-a", "responder-b"] {
        let responder = swarm.responder(id);
        let token = shutdown.clone();
        handles.push(tokio::spawn(async move {
            let supervisor = BackoffSupervisor::new(BackoffPolicy::default());
            supervisor.run(responder, period, token).await
        }));
    }

    tokio::time::sleep(Duration::from_secs(60)).await;
    shutdown.cancel();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(swarm.alert_count().await, 1);
    let events = receiver.drain();
    assert_eq!(count(&events, "aggregatorAlert"), 1);
    assert_eq!(count(&events, "responseStart"), 1);
    assert_eq!(count(&events, "responseComplete"), 1);
}
