// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Anomaly simulator: injects synthetic warnings so a demo deployment has
//! something to correlate. Also backs the manual `/trigger` endpoint.

use async_trait::async_trait;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::info;

use crate::application::event_log::{EventLog, TransportError};
use crate::domain::agent::AgentId;
use crate::domain::event::{fields, EventId, LogKind};
use crate::domain::events::{DashboardEvent, SimulatorNotice};
use crate::domain::node_config::SimulatorConfig;
use crate::domain::supervisor::PeriodicTask;
use crate::infrastructure::event_bus::DashboardBus;

pub const SIMULATOR_AGENT: &str = "simulator";
pub const MANUAL_AGENT: &str = "manual";

const LATERAL_MOVEMENT: &str = "lateral_movement";
const FALSE_POSITIVE: &str = "false_positive";
const MANUAL_TRIGGER: &str = "manual_trigger";

#[derive(Clone)]
pub struct AnomalySimulator {
    log: EventLog,
    bus: DashboardBus,
    region: String,
    config: SimulatorConfig,
}

impl AnomalySimulator {
    pub fn new(log: EventLog, bus: DashboardBus, region: impl Into<String>, config: SimulatorConfig) -> Self {
        Self {
            log,
            bus,
            region: region.into(),
            config,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// One simulation step given two uniform `[0,1)` draws.
    pub async fn simulate(&self, lateral_roll: f64, false_positive_roll: f64) -> Result<(), TransportError> {
        if lateral_roll < self.config.lateral_movement_probability {
            info!(region = %self.region, "Simulating lateral movement attack");
            self.inject(SIMULATOR_AGENT, LATERAL_MOVEMENT, &self.region).await?;
            self.bus.publish(DashboardEvent::SimulatorAnomaly(SimulatorNotice::new(
                AgentId::new(SIMULATOR_AGENT),
                LATERAL_MOVEMENT,
                self.region.as_str(),
            )));
        }

        if false_positive_roll < self.config.false_positive_probability {
            info!(region = %self.region, "Simulating false positive");
            self.inject(SIMULATOR_AGENT, FALSE_POSITIVE, &self.region).await?;
            self.bus.publish(DashboardEvent::SimulatorFalsePositive(SimulatorNotice::new(
                AgentId::new(SIMULATOR_AGENT),
                FALSE_POSITIVE,
                self.region.as_str(),
            )));
        }

        Ok(())
    }

    /// Inject a `manual_trigger` warning; `None` targets this node's region.
    pub async fn trigger_manual(&self, region: Option<&str>) -> Result<EventId, TransportError> {
        let region = region.unwrap_or(&self.region);
        info!(region, "Manually triggering anomaly");
        let id = self.inject(MANUAL_AGENT, MANUAL_TRIGGER, region).await?;
        self.bus.publish(DashboardEvent::SimulatorManualTrigger(SimulatorNotice::new(
            AgentId::new(MANUAL_AGENT),
            MANUAL_TRIGGER,
            region,
        )));
        Ok(id)
    }

    async fn inject(&self, agent: &str, kind: &str, region: &str) -> Result<EventId, TransportError> {
        let fields = BTreeMap::from([
            (fields::AGENT_ID.to_string(), agent.to_string()),
            (fields::TYPE.to_string(), kind.to_string()),
            (fields::REGION.to_string(), region.to_string()),
        ]);
        metrics::counter!("stigmergy_simulator_injected_total", "type" => kind.to_string()).increment(1);
        self.log.append(LogKind::Warning, region, fields).await
    }
}

#[async_trait]
impl PeriodicTask for AnomalySimulator {
    fn name(&self) -> &str {
        SIMULATOR_AGENT
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let (lateral_roll, false_positive_roll) = {
            let mut rng = rand::rng();
            (rng.random::<f64>(), rng.random::<f64>())
        };
        self.simulate(lateral_roll, false_positive_roll).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::Cursor;
    use crate::domain::node_config::StreamsConfig;
    use crate::infrastructure::in_memory_store::InMemoryStore;
    use std::sync::Arc;

    fn simulator() -> (AnomalySimulator, EventLog, DashboardBus) {
        let log = EventLog::new(
            Arc::new(InMemoryStore::new()),
            StreamsConfig {
                block_ms: 0,
                ..StreamsConfig::default()
            },
        );
        let bus = DashboardBus::new(16);
        let sim = AnomalySimulator::new(log.clone(), bus.clone(), "eu-west", SimulatorConfig::default());
        (sim, log, bus)
    }

    #[tokio::test]
    async fn test_rolls_decide_injection() {
        let (sim, log, bus) = simulator();
        let mut receiver = bus.subscribe();

        sim.simulate(0.5, 0.5).await.unwrap();
        sim.simulate(0.01, 0.5).await.unwrap();
        sim.simulate(0.5, 0.01).await.unwrap();

        let batch = log
            .read_since(LogKind::Warning, "eu-west", Cursor::beginning())
            .await
            .unwrap();
        let kinds: Vec<_> = batch.events.iter().filter_map(|e| e.field(fields::TYPE)).collect();
        assert_eq!(kinds, vec![LATERAL_MOVEMENT, FALSE_POSITIVE]);
        assert!(batch.events.iter().all(|e| e.agent_id() == Some(SIMULATOR_AGENT)));

        let names: Vec<_> = receiver.drain().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["simulatorAnomaly", "simulatorFalsePositive"]);
    }

    #[tokio::test]
    async fn test_manual_trigger_targets_region() {
        let (sim, log, bus) = simulator();
        let mut receiver = bus.subscribe();

        sim.trigger_manual(Some("us-east")).await.unwrap();
        sim.trigger_manual(None).await.unwrap();

        let us = log
            .read_since(LogKind::Warning, "us-east", Cursor::beginning())
            .await
            .unwrap();
        assert_eq!(us.events.len(), 1);
        assert_eq!(us.events[0].agent_id(), Some(MANUAL_AGENT));
        assert_eq!(us.events[0].field(fields::TYPE), Some(MANUAL_TRIGGER));

        let eu = log
            .read_since(LogKind::Warning, "eu-west", Cursor::beginning())
            .await
            .unwrap();
        assert_eq!(eu.events.len(), 1);

        match receiver.recv().await.unwrap() {
            DashboardEvent::SimulatorManualTrigger(notice) => assert_eq!(notice.region, "us-east"),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
