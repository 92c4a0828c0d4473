// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Node runtime
//!
//! Wires one process together:
//! - store bundle for the configured backend
//! - one supervised loop per agent role
//! - the control API and dashboard stream
//! - graceful shutdown on Ctrl+C / SIGTERM

use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use stigmergy_core::application::event_log::EventLog;
use stigmergy_core::application::lease_manager::LeaseManager;
use stigmergy_core::application::simulator::AnomalySimulator;
use stigmergy_core::application::store_factory::{create_stores, StoreBackend, Stores};
use stigmergy_core::domain::agent::{AgentId, AgentRole};
use stigmergy_core::domain::node_config::NodeConfigManifest;
use stigmergy_core::domain::supervisor::{BackoffPolicy, BackoffSupervisor, PeriodicTask};
use stigmergy_core::infrastructure::event_bus::DashboardBus;
use stigmergy_core::presentation::api::{self, AppState};
use stigmergy_swarm::application::{AggregatorAgent, ResponderAgent, SensorAgent};
use stigmergy_swarm::domain::RemediationPlan;

pub mod client;

pub use client::ControlClient;

pub struct Node {
    config: Arc<NodeConfigManifest>,
    stores: Stores,
    log: EventLog,
    bus: DashboardBus,
}

impl Node {
    pub fn new(config: NodeConfigManifest) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;

        let backend = StoreBackend::from_config(&config.spec.store).context("Invalid store configuration")?;
        let stores = create_stores(&backend).context("Failed to create store")?;
        let log = EventLog::new(stores.streams.clone(), config.spec.streams.clone());

        Ok(Self {
            config: Arc::new(config),
            stores,
            log,
            bus: DashboardBus::with_default_capacity(),
        })
    }

    pub fn config(&self) -> &NodeConfigManifest {
        &self.config
    }

    pub fn bus(&self) -> &DashboardBus {
        &self.bus
    }

    fn region(&self) -> &str {
        &self.config.spec.agent.region
    }

    /// Agents sharing a process get role-suffixed ids so their reports stay distinct.
    fn agent_id(&self, role: AgentRole, shared: bool) -> AgentId {
        let id = &self.config.spec.agent.id;
        if shared {
            AgentId::new(format!("{}-{}", id, role))
        } else {
            id.clone()
        }
    }

    fn backoff_policy(&self) -> BackoffPolicy {
        let supervisor = &self.config.spec.supervisor;
        BackoffPolicy {
            base: supervisor.backoff_base(),
            max: supervisor.backoff_max(),
            alert_after: supervisor.intervention_after,
        }
    }

    fn supervisor(&self) -> BackoffSupervisor {
        BackoffSupervisor::new(self.backoff_policy())
    }

    fn simulator(&self) -> AnomalySimulator {
        AnomalySimulator::new(
            self.log.clone(),
            self.bus.clone(),
            self.region(),
            self.config.spec.simulator.clone(),
        )
    }

    fn spawn_supervised<T: PeriodicTask + 'static>(
        &self,
        tasks: &mut JoinSet<()>,
        task: T,
        period: Duration,
        shutdown: &CancellationToken,
    ) {
        let supervisor = self.supervisor();
        let shutdown = shutdown.clone();
        tasks.spawn(async move { supervisor.run(task, period, shutdown).await });
    }

    /// Start one supervised loop per role. Loops stop when `shutdown` is cancelled.
    pub async fn spawn_agents(&self, roles: &[AgentRole], shutdown: &CancellationToken) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        let shared = roles.len() > 1;
        let spec = &self.config.spec;

        for role in roles {
            let id = self.agent_id(*role, shared);
            info!(agent_id = %id, role = %role, region = %self.region(), "Starting agent");

            match role {
                AgentRole::Sensor => {
                    let sensor = SensorAgent::new(id, self.region(), self.log.clone(), self.bus.clone(), &spec.sensor);
                    sensor.register(self.stores.registry.as_ref()).await;
                    // the listener stops on the same token, it is not joined
                    sensor.spawn_feedback_listener(
                        self.stores.feedback.clone(),
                        self.backoff_policy(),
                        shutdown.clone(),
                    );
                    let period = Duration::from_millis(spec.sensor.poll_interval_ms);
                    self.spawn_supervised(&mut tasks, sensor, period, shutdown);
                }
                AgentRole::Aggregator => {
                    let aggregator = AggregatorAgent::new(
                        id,
                        self.region(),
                        self.log.clone(),
                        self.bus.clone(),
                        self.stores.registry.clone(),
                        &spec.aggregator,
                    );
                    let period = Duration::from_millis(spec.aggregator.poll_interval_ms);
                    self.spawn_supervised(&mut tasks, aggregator, period, shutdown);
                }
                AgentRole::Responder => {
                    let leases = LeaseManager::new(self.stores.leases.clone(), id, spec.responder.lock_ttl());
                    let responder = ResponderAgent::new(
                        self.region(),
                        self.log.clone(),
                        self.bus.clone(),
                        leases,
                        RemediationPlan::from_config(&spec.responder),
                        Duration::from_millis(spec.aggregator.sliding_window_ms),
                    );
                    let period = Duration::from_millis(spec.responder.poll_interval_ms);
                    self.spawn_supervised(&mut tasks, responder, period, shutdown);
                }
                AgentRole::Simulator => {
                    let period = Duration::from_millis(spec.simulator.interval_ms);
                    self.spawn_supervised(&mut tasks, self.simulator(), period, shutdown);
                }
            }
        }

        metrics::gauge!("stigmergy_node_agents_running").set(tasks.len() as f64);
        tasks
    }

    /// Control API for this node.
    pub fn control_api(&self) -> axum::Router {
        api::app(AppState {
            region: self.region().to_string(),
            health: self.stores.health.clone(),
            feedback: self.stores.feedback.clone(),
            simulator: self.simulator(),
            bus: self.bus.clone(),
        })
    }

    /// Run `roles` plus the control API until `shutdown_signal` resolves.
    pub async fn run(self, roles: Vec<AgentRole>, shutdown_signal: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let network = &self.config.spec.network;
        let addr = format!("{}:{}", network.bind_address, network.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("Control API listening on {}", addr);

        let shutdown = CancellationToken::new();
        let mut agents = self.spawn_agents(&roles, &shutdown).await;

        let server_shutdown = shutdown.clone();
        let server = axum::serve(listener, self.control_api()).with_graceful_shutdown(async move {
            server_shutdown.cancelled().await;
        });

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal.await;
            trigger.cancel();
        });

        server.await.context("Control API server failed")?;
        shutdown.cancel();

        while let Some(joined) = agents.join_next().await {
            if let Err(e) = joined {
                warn!("Agent loop ended abnormally: {}", e);
            }
        }
        info!("Node stopped");
        Ok(())
    }
}

/// Install the Prometheus exporter when enabled in config.
pub fn install_metrics_exporter(config: &NodeConfigManifest) -> Result<()> {
    let metrics = &config.spec.observability.metrics;
    if !metrics.enabled {
        return Ok(());
    }

    let addr: SocketAddr = ([0, 0, 0, 0], metrics.port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus metrics on {}/metrics", addr);
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stigmergy_core::domain::event::{Cursor, LogKind};
    use stigmergy_core::domain::node_config::NodeConfigSpec;

    fn config() -> NodeConfigManifest {
        let mut config = NodeConfigManifest::default();
        config.spec.agent.id = AgentId::new("node-1");
        config.spec.agent.region = "eu".to_string();
        config.spec.network.port = 0;
        config
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut bad = config();
        bad.spec.aggregator.quorum_ratio = 1.5;
        assert!(Node::new(bad).is_err());

        let mut remote = config();
        remote.spec.store.url = "redis://localhost".to_string();
        assert!(Node::new(remote).is_err());
    }

    #[test]
    fn test_shared_process_suffixes_ids() {
        let node = Node::new(config()).unwrap();
        assert_eq!(node.agent_id(AgentRole::Sensor, false).as_str(), "node-1");
        assert_eq!(node.agent_id(AgentRole::Responder, true).as_str(), "node-1-responder");
        assert_eq!(NodeConfigSpec::default().agent.region, "default-region");
    }

    #[tokio::test]
    async fn test_agents_stop_on_shutdown() {
        let node = Node::new(config()).unwrap();
        let shutdown = CancellationToken::new();
        let mut agents = node
            .spawn_agents(&[AgentRole::Sensor, AgentRole::Aggregator, AgentRole::Responder], &shutdown)
            .await;
        assert_eq!(agents.len(), 3);

        shutdown.cancel();
        while let Some(joined) = agents.join_next().await {
            joined.unwrap();
        }
    }

    #[tokio::test]
    async fn test_control_api_trigger_reaches_log() {
        let node = Node::new(config()).unwrap();
        node.simulator().trigger_manual(None).await.unwrap();

        let batch = node
            .log
            .read_since(LogKind::Warning, "eu", Cursor::beginning())
            .await
            .unwrap();
        assert_eq!(batch.events.len(), 1);
    }
}
