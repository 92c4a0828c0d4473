// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Aggregator Agent
//!
//! Escalates correlated warnings into an alert once a quorum of distinct
//! sensors has reported inside the sliding window. No vote state survives a
//! tick; each evaluation starts from the window just read.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use stigmergy_core::application::event_log::{filter_recent, EventLog};
use stigmergy_core::domain::agent::AgentId;
use stigmergy_core::domain::event::{fields, Cursor, EventId, LogKind};
use stigmergy_core::domain::events::{DashboardEvent, PheromoneNotice};
use stigmergy_core::domain::node_config::AggregatorConfig;
use stigmergy_core::domain::store::SensorRegistry;
use stigmergy_core::domain::supervisor::PeriodicTask;
use stigmergy_core::infrastructure::event_bus::DashboardBus;

use crate::domain::quorum::QuorumDecision;

pub struct AggregatorAgent {
    id: AgentId,
    region: String,
    log: EventLog,
    bus: DashboardBus,
    registry: Arc<dyn SensorRegistry>,
    quorum_ratio: f64,
    window: Duration,
    total_sensors: Option<usize>,
    cursor: Cursor,
}

impl AggregatorAgent {
    pub fn new(
        id: AgentId,
        region: impl Into<String>,
        log: EventLog,
        bus: DashboardBus,
        registry: Arc<dyn SensorRegistry>,
        config: &AggregatorConfig,
    ) -> Self {
        Self {
            id,
            region: region.into(),
            log,
            bus,
            registry,
            quorum_ratio: config.quorum_ratio,
            window: Duration::from_millis(config.sliding_window_ms),
            total_sensors: config.total_sensors,
            cursor: Cursor::Latest,
        }
    }

    pub fn starting_at(mut self, cursor: Cursor) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Static count when configured, otherwise the region's registry.
    /// A failed lookup is unknown, never zero.
    async fn total_sensors(&self) -> Option<usize> {
        if let Some(total) = self.total_sensors {
            return Some(total);
        }
        match self.registry.count(&self.region).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(region = %self.region, "Sensor count lookup failed: {}", e);
                None
            }
        }
    }

    async fn raise_alert(&self, unique: usize, threshold: usize) -> anyhow::Result<EventId> {
        let data = BTreeMap::from([
            (fields::AGENT_ID.to_string(), self.id.to_string()),
            (fields::COUNT.to_string(), unique.to_string()),
            (fields::REGION.to_string(), self.region.clone()),
            (fields::THRESHOLD.to_string(), threshold.to_string()),
        ]);
        let id = self.log.append(LogKind::Alert, &self.region, data.clone()).await?;

        metrics::counter!("stigmergy_aggregator_alerts_total").increment(1);
        info!(
            agent_id = %self.id,
            region = %self.region,
            id = %id,
            unique,
            threshold,
            "Quorum reached, alert raised"
        );
        self.bus.publish(DashboardEvent::AggregatorAlert(PheromoneNotice::new(
            self.id.clone(),
            id,
            data,
        )));
        Ok(id)
    }
}

#[async_trait]
impl PeriodicTask for AggregatorAgent {
    fn name(&self) -> &str {
        "aggregator"
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let batch = self
            .log
            .read_since(LogKind::Warning, &self.region, self.cursor)
            .await?;
        self.cursor = Cursor::After(batch.last_seen);

        let recent = filter_recent(&batch.events, self.window);
        if recent.is_empty() {
            return Ok(());
        }

        let total = self.total_sensors().await.unwrap_or(0);
        match QuorumDecision::evaluate(total, self.quorum_ratio, &recent) {
            QuorumDecision::Unknown => {
                metrics::counter!("stigmergy_aggregator_quorum_skipped_total").increment(1);
                warn!(
                    region = %self.region,
                    warnings = recent.len(),
                    total,
                    ratio = self.quorum_ratio,
                    "Quorum undefined, skipping evaluation"
                );
            }
            QuorumDecision::NotReached { unique, threshold } => {
                debug!(region = %self.region, unique, threshold, "Quorum not reached");
            }
            QuorumDecision::Reached { unique, threshold } => {
                self.raise_alert(unique, threshold).await?;
            }
        }
        Ok(())
    }
}
