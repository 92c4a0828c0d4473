// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Responder Agent
//!
//! Picks up recent alerts and remediates each one under an exclusive lease.
//! Responders race for the same alerts; the lease decides who acts.
//!
//! Acquire → phases → release. Release runs whatever happened during the
//! phases; if it fails the lease TTL bounds how long the alert stays claimed.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

use stigmergy_core::application::event_log::{filter_recent, EventLog};
use stigmergy_core::application::lease_manager::LeaseManager;
use stigmergy_core::domain::agent::AgentId;
use stigmergy_core::domain::event::{Cursor, Event, LogKind};
use stigmergy_core::domain::events::{DashboardEvent, PhaseNotice, PhaseStatus, ResponseNotice};
use stigmergy_core::domain::lease::LeaseKey;
use stigmergy_core::domain::supervisor::PeriodicTask;
use stigmergy_core::infrastructure::event_bus::DashboardBus;

use crate::domain::remediation::{RemediationPhase, RemediationPlan};

pub struct ResponderAgent {
    id: AgentId,
    region: String,
    log: EventLog,
    bus: DashboardBus,
    leases: LeaseManager,
    plan: RemediationPlan,
    window: Duration,
    cursor: Cursor,
}

impl ResponderAgent {
    /// `window` is the aggregator's sliding window; older alerts are ignored.
    pub fn new(
        region: impl Into<String>,
        log: EventLog,
        bus: DashboardBus,
        leases: LeaseManager,
        plan: RemediationPlan,
        window: Duration,
    ) -> Self {
        Self {
            id: leases.owner().clone(),
            region: region.into(),
            log,
            bus,
            leases,
            plan,
            window,
            cursor: Cursor::Latest,
        }
    }

    pub fn starting_at(mut self, cursor: Cursor) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Handle one alert. Returns whether this responder ran the remediation.
    pub async fn respond(&self, alert: &Event) -> bool {
        let key = LeaseKey::for_alert(&alert.id);
        if !self.leases.acquire(&key).await {
            metrics::counter!("stigmergy_responder_skipped_total").increment(1);
            debug!(agent_id = %self.id, alert_id = %alert.id, "Alert claimed elsewhere, skipping");
            return false;
        }

        self.remediate(alert).await;

        if !self.leases.release(&key).await {
            warn!(
                agent_id = %self.id,
                alert_id = %alert.id,
                ttl_ms = self.leases.ttl().as_millis() as u64,
                "Lease release failed, waiting for expiry"
            );
        }
        true
    }

    async fn remediate(&self, alert: &Event) {
        info!(agent_id = %self.id, region = %self.region, alert_id = %alert.id, "Starting response");
        metrics::counter!("stigmergy_responder_remediations_started_total").increment(1);
        self.bus
            .publish(DashboardEvent::ResponseStart(ResponseNotice::started(self.id.clone(), alert)));

        for phase in self.plan.phases() {
            self.run_phase(alert, phase).await;
        }

        metrics::counter!("stigmergy_responder_remediations_completed_total").increment(1);
        info!(agent_id = %self.id, alert_id = %alert.id, "Response complete");
        self.bus.publish(DashboardEvent::ResponseComplete(ResponseNotice::completed(
            self.id.clone(),
            alert.id,
        )));
    }

    async fn run_phase(&self, alert: &Event, phase: &RemediationPhase) {
        info!(agent_id = %self.id, alert_id = %alert.id, phase = %phase.kind, "Phase started");
        self.announce(alert, phase, PhaseStatus::Started);
        tokio::time::sleep(phase.duration).await;
        self.announce(alert, phase, PhaseStatus::Completed);
    }

    fn announce(&self, alert: &Event, phase: &RemediationPhase, status: PhaseStatus) {
        self.bus.publish(DashboardEvent::ResponsePhase(PhaseNotice {
            agent_id: self.id.clone(),
            alert_id: alert.id,
            phase: phase.kind.to_string(),
            status,
            timestamp: Utc::now().timestamp_millis(),
        }));
    }
}

#[async_trait]
impl PeriodicTask for ResponderAgent {
    fn name(&self) -> &str {
        "responder"
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let batch = self
            .log
            .read_since(LogKind::Alert, &self.region, self.cursor)
            .await?;
        self.cursor = Cursor::After(batch.last_seen);

        for alert in filter_recent(&batch.events, self.window) {
            self.respond(&alert).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use stigmergy_core::domain::node_config::StreamsConfig;
    use stigmergy_core::infrastructure::in_memory_store::InMemoryStore;

    fn responder(store: &InMemoryStore, id: &str, bus: DashboardBus) -> ResponderAgent {
        let log = EventLog::new(
            Arc::new(store.clone()),
            StreamsConfig {
                block_ms: 0,
                ..StreamsConfig::default()
            },
        );
        let leases = LeaseManager::new(Arc::new(store.clone()), AgentId::new(id), Duration::from_secs(15));
        ResponderAgent::new(
            "eu",
            log,
            bus,
            leases,
            RemediationPlan::new(Duration::from_secs(10), Duration::from_secs(2)),
            Duration::from_secs(30),
        )
        .starting_at(Cursor::beginning())
    }

    async fn raise(store: &InMemoryStore) -> Event {
        let log = EventLog::new(Arc::new(store.clone()), StreamsConfig::default());
        let fields = BTreeMap::from([("agentId".to_string(), "agg-1".to_string())]);
        let id = log.append(LogKind::Alert, "eu", fields).await.unwrap();
        let batch = log
            .read_since(LogKind::Alert, "eu", Cursor::beginning())
            .await
            .unwrap();
        batch.events.into_iter().find(|e| e.id == id).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_are_announced_in_order_and_lease_released() {
        let store = InMemoryStore::new();
        let bus = DashboardBus::new(32);
        let mut receiver = bus.subscribe();
        let mut agent = responder(&store, "r1", bus);
        let alert = raise(&store).await;

        agent.tick().await.unwrap();

        let names: Vec<_> = receiver
            .drain()
            .into_iter()
            .map(|event| match event {
                DashboardEvent::ResponsePhase(notice) => format!("{}:{:?}", notice.phase, notice.status),
                other => other.name().to_string(),
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "responseStart",
                "isolate:Started",
                "isolate:Completed",
                "scan:Started",
                "scan:Completed",
                "responseComplete",
            ]
        );
        assert_eq!(store.lease_owner(LeaseKey::for_alert(&alert.id).as_str()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claimed_alert_is_skipped() {
        let store = InMemoryStore::new();
        let alert = raise(&store).await;
        let other = LeaseManager::new(Arc::new(store.clone()), AgentId::new("r2"), Duration::from_secs(15));
        assert!(other.acquire(&LeaseKey::for_alert(&alert.id)).await);

        let bus = DashboardBus::new(32);
        let mut receiver = bus.subscribe();
        let agent = responder(&store, "r1", bus);

        assert!(!agent.respond(&alert).await);
        assert!(receiver.drain().is_empty());
        assert_eq!(
            store.lease_owner(LeaseKey::for_alert(&alert.id).as_str()),
            Some(AgentId::new("r2"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_handled_once_per_cursor() {
        let store = InMemoryStore::new();
        let bus = DashboardBus::new(32);
        let mut receiver = bus.subscribe();
        let mut agent = responder(&store, "r1", bus);
        raise(&store).await;

        agent.tick().await.unwrap();
        agent.tick().await.unwrap();

        let starts = receiver
            .drain()
            .iter()
            .filter(|e| e.name() == "responseStart")
            .count();
        assert_eq!(starts, 1);
    }
}
