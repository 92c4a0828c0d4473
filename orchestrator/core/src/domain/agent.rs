// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of one agent process. Opaque and stable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random id of the form `agent-xxxxxxxx`.
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(format!("agent-{}", &raw[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Behavior an agent process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Sensor,
    Aggregator,
    Responder,
    Simulator,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Sensor,
        AgentRole::Aggregator,
        AgentRole::Responder,
        AgentRole::Simulator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Sensor => "sensor",
            AgentRole::Aggregator => "aggregator",
            AgentRole::Responder => "responder",
            AgentRole::Simulator => "simulator",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sensor" => Ok(AgentRole::Sensor),
            "aggregator" => Ok(AgentRole::Aggregator),
            // "response" is the historical deployment name for the responder
            "responder" | "response" => Ok(AgentRole::Responder),
            "simulator" => Ok(AgentRole::Simulator),
            other => Err(format!(
                "unknown agent role '{}', expected sensor, aggregator, responder or simulator",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_prefixed_and_unique() {
        let a = AgentId::generate();
        let b = AgentId::generate();
        assert!(a.as_str().starts_with("agent-"));
        assert_eq!(a.as_str().len(), "agent-".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Sensor".parse::<AgentRole>().unwrap(), AgentRole::Sensor);
        assert_eq!("response".parse::<AgentRole>().unwrap(), AgentRole::Responder);
        assert!("judge".parse::<AgentRole>().is_err());
    }
}
