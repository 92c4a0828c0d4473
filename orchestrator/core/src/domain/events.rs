// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Dashboard Notifications
//!
//! Named notifications pushed to the live dashboard. Observability only:
//! delivery is best-effort fan-out and everything here can be rebuilt from
//! the logs.
//!
//! Wire shape is `{"type": "<name>", "payload": {...}}`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::agent::AgentId;
use crate::domain::event::{Event, EventId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum DashboardEvent {
    SensorPheromone(PheromoneNotice),
    AggregatorAlert(PheromoneNotice),
    ResponseStart(ResponseNotice),
    ResponsePhase(PhaseNotice),
    ResponseComplete(ResponseNotice),
    SimulatorAnomaly(SimulatorNotice),
    SimulatorFalsePositive(SimulatorNotice),
    SimulatorManualTrigger(SimulatorNotice),
}

impl DashboardEvent {
    /// Notification name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            DashboardEvent::SensorPheromone(_) => "sensorPheromone",
            DashboardEvent::AggregatorAlert(_) => "aggregatorAlert",
            DashboardEvent::ResponseStart(_) => "responseStart",
            DashboardEvent::ResponsePhase(_) => "responsePhase",
            DashboardEvent::ResponseComplete(_) => "responseComplete",
            DashboardEvent::SimulatorAnomaly(_) => "simulatorAnomaly",
            DashboardEvent::SimulatorFalsePositive(_) => "simulatorFalsePositive",
            DashboardEvent::SimulatorManualTrigger(_) => "simulatorManualTrigger",
        }
    }
}

/// A freshly appended warning or alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PheromoneNotice {
    pub agent_id: AgentId,
    pub id: EventId,
    pub data: BTreeMap<String, String>,
    pub timestamp: i64,
}

impl PheromoneNotice {
    pub fn new(agent_id: AgentId, id: EventId, data: BTreeMap<String, String>) -> Self {
        Self {
            agent_id,
            id,
            data,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Start or end of a remediation for one alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseNotice {
    pub agent_id: AgentId,
    pub alert_id: EventId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
    pub timestamp: i64,
}

impl ResponseNotice {
    pub fn started(agent_id: AgentId, alert: &Event) -> Self {
        Self {
            agent_id,
            alert_id: alert.id,
            data: Some(alert.fields.clone()),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn completed(agent_id: AgentId, alert_id: EventId) -> Self {
        Self {
            agent_id,
            alert_id,
            data: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Started,
    Completed,
}

/// Progress of a single remediation phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseNotice {
    pub agent_id: AgentId,
    pub alert_id: EventId,
    pub phase: String,
    pub status: PhaseStatus,
    pub timestamp: i64,
}

/// Synthetic anomaly injected by the simulator or a manual trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorNotice {
    pub agent_id: AgentId,
    #[serde(rename = "type")]
    pub kind: String,
    pub region: String,
    pub timestamp: i64,
}

impl SimulatorNotice {
    pub fn new(agent_id: AgentId, kind: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            agent_id,
            kind: kind.into(),
            region: region.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_uses_camel_case_names() {
        let event = DashboardEvent::ResponseComplete(ResponseNotice::completed(
            AgentId::new("responder-1"),
            EventId::new(10, 2),
        ));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "responseComplete");
        assert_eq!(json["payload"]["agentId"], "responder-1");
        assert_eq!(json["payload"]["alertId"], "10-2");
        assert!(json["payload"].get("data").is_none());
        assert_eq!(event.name(), "responseComplete");
    }

    #[test]
    fn test_simulator_notice_kind_is_renamed() {
        let event = DashboardEvent::SimulatorManualTrigger(SimulatorNotice::new(
            AgentId::new("manual"),
            "manual_trigger",
            "eu-west",
        ));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "simulatorManualTrigger");
        assert_eq!(json["payload"]["type"], "manual_trigger");
        assert_eq!(json["payload"]["region"], "eu-west");
    }
}
