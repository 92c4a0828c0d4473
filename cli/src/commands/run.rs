// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `stigmergy run`: start this node's agents and control API

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use tracing::info;

use stigmergy_core::domain::agent::AgentRole;
use stigmergy_core::domain::node_config::NodeConfigManifest;

use crate::node::{install_metrics_exporter, shutdown_signal, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Sensor,
    Aggregator,
    Responder,
    Simulator,
    /// Every role in one process over one store
    All,
}

/// Roles to start: the flag wins over `spec.agent.role`. An enabled simulator
/// rides along with any role.
pub fn resolve_roles(flag: Option<RoleArg>, config: &NodeConfigManifest) -> Result<Vec<AgentRole>> {
    let mut roles = match flag {
        Some(RoleArg::All) => AgentRole::ALL.to_vec(),
        Some(RoleArg::Sensor) => vec![AgentRole::Sensor],
        Some(RoleArg::Aggregator) => vec![AgentRole::Aggregator],
        Some(RoleArg::Responder) => vec![AgentRole::Responder],
        Some(RoleArg::Simulator) => vec![AgentRole::Simulator],
        None => match config.spec.agent.role {
            Some(role) => vec![role],
            None => anyhow::bail!(
                "No agent role configured. Pass --role or set spec.agent.role / STIGMERGY_AGENT_ROLE"
            ),
        },
    };

    if config.spec.simulator.enabled && !roles.contains(&AgentRole::Simulator) {
        roles.push(AgentRole::Simulator);
    }
    Ok(roles)
}

pub async fn execute(role: Option<RoleArg>, config_path: Option<PathBuf>) -> Result<()> {
    let config = NodeConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    let roles = resolve_roles(role, &config)?;

    install_metrics_exporter(&config)?;

    let node = Node::new(config)?;
    info!(
        node = %node.config().metadata.name,
        region = %node.config().spec.agent.region,
        store = %node.config().spec.store.url,
        roles = ?roles,
        "Stigmergy node starting"
    );

    node.run(roles, shutdown_signal()).await
}
