// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Sensor Agent
//!
//! Each tick samples a local anomaly metric, looks at which neighbors have
//! recently reported in the region, and emits a warning when the metric
//! crosses its threshold. Operator feedback nudges the threshold through a
//! separate listener task.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use stigmergy_core::application::event_log::{filter_recent, EventLog};
use stigmergy_core::domain::agent::AgentId;
use stigmergy_core::domain::event::{fields, Cursor, LogKind};
use stigmergy_core::domain::events::{DashboardEvent, PheromoneNotice};
use stigmergy_core::domain::feedback::Feedback;
use stigmergy_core::domain::node_config::SensorConfig;
use stigmergy_core::domain::store::{FeedbackBus, SensorRegistry};
use stigmergy_core::domain::supervisor::{BackoffPolicy, PeriodicTask};
use stigmergy_core::infrastructure::event_bus::DashboardBus;

use crate::domain::detection::{Detection, SharedThreshold};
use crate::domain::quorum::distinct_agents;

/// Source of the local anomaly signal, a value in `[0, 1]`.
pub trait MetricSource: Send {
    fn sample(&mut self) -> f64;
}

/// Uniform random metric, standing in for a real detector.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomMetricSource;

impl MetricSource for RandomMetricSource {
    fn sample(&mut self) -> f64 {
        rand::rng().random::<f64>()
    }
}

pub struct SensorAgent {
    id: AgentId,
    region: String,
    log: EventLog,
    bus: DashboardBus,
    threshold: SharedThreshold,
    neighbor_window: Duration,
    cursor: Cursor,
    source: Box<dyn MetricSource>,
}

impl SensorAgent {
    pub fn new(
        id: AgentId,
        region: impl Into<String>,
        log: EventLog,
        bus: DashboardBus,
        config: &SensorConfig,
    ) -> Self {
        Self {
            id,
            region: region.into(),
            log,
            bus,
            threshold: SharedThreshold::new(config.threshold),
            neighbor_window: Duration::from_millis(config.neighbor_window_ms),
            cursor: Cursor::Latest,
            source: Box::new(RandomMetricSource),
        }
    }

    pub fn with_metric_source(mut self, source: impl MetricSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    /// Override the initial cursor, which defaults to the end of the log.
    pub fn starting_at(mut self, cursor: Cursor) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Handle onto the live threshold; clones observe feedback adjustments.
    pub fn threshold(&self) -> SharedThreshold {
        self.threshold.clone()
    }

    /// Add this sensor to the region's registry. Failure only degrades the
    /// aggregator's dynamic sensor count, so it is logged and ignored.
    pub async fn register(&self, registry: &dyn SensorRegistry) {
        match registry.register(&self.region, &self.id).await {
            Ok(()) => info!(agent_id = %self.id, region = %self.region, "Registered sensor"),
            Err(e) => warn!(agent_id = %self.id, region = %self.region, "Sensor registration failed: {}", e),
        }
    }

    /// Apply operator feedback to the threshold until `shutdown` fires.
    ///
    /// A failed or closed subscription is renewed after `policy` delays, so a
    /// sensor started before the store, or outliving a store restart, keeps
    /// adapting.
    pub fn spawn_feedback_listener(
        &self,
        feedback: Arc<dyn FeedbackBus>,
        policy: BackoffPolicy,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let agent = self.id.clone();
        let threshold = self.threshold.clone();

        tokio::spawn(async move {
            let mut failures = 0u32;
            loop {
                let subscribed = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    subscribed = feedback.subscribe(&agent) => subscribed,
                };
                match subscribed {
                    Ok(subscription) => {
                        failures = 0;
                        info!(agent_id = %agent, "Listening for feedback");
                        if consume_feedback(&agent, &threshold, subscription, &shutdown).await {
                            return;
                        }
                        warn!(agent_id = %agent, "Feedback subscription closed, resubscribing");
                    }
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        metrics::counter!("stigmergy_sensor_feedback_subscribe_failures_total")
                            .increment(1);
                        warn!(agent_id = %agent, failures, "Feedback subscription failed: {}", e);
                    }
                }

                let delay = policy.delay(failures);
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        })
    }

    async fn detect(&mut self) -> anyhow::Result<Detection> {
        let metric = self.source.sample();
        let threshold = self.threshold.get();

        let batch = self
            .log
            .read_since(LogKind::Warning, &self.region, self.cursor)
            .await?;
        self.cursor = Cursor::After(batch.last_seen);

        let recent = filter_recent(&batch.events, self.neighbor_window);
        let neighbors = distinct_agents(&recent, Some(self.id.as_str()));
        Ok(Detection::assess(metric, threshold, neighbors))
    }
}

/// Drain one subscription. Returns `true` when stopped by `shutdown`.
async fn consume_feedback(
    agent: &AgentId,
    threshold: &SharedThreshold,
    mut subscription: BoxStream<'static, Feedback>,
    shutdown: &CancellationToken,
) -> bool {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return true,
            next = subscription.next() => {
                let Some(message) = next else {
                    return false;
                };
                let updated = threshold.apply_feedback(message.feedback_type);
                metrics::counter!(
                    "stigmergy_sensor_feedback_total",
                    "type" => message.feedback_type.to_string()
                )
                .increment(1);
                info!(
                    agent_id = %agent,
                    detection_id = %message.detection_id,
                    feedback = %message.feedback_type,
                    threshold = updated,
                    "Adjusted detection threshold"
                );
            }
        }
    }
}

#[async_trait]
impl PeriodicTask for SensorAgent {
    fn name(&self) -> &str {
        "sensor"
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let detection = self.detect().await?;
        if !detection.should_emit() {
            debug!(
                agent_id = %self.id,
                metric = detection.metric,
                neighbors = detection.neighbor_count,
                "Below threshold"
            );
            return Ok(());
        }

        let mut data = detection.warning_fields(self.id.as_str(), &self.region);
        let id = self
            .log
            .append(LogKind::Warning, &self.region, data.clone())
            .await?;

        metrics::counter!(
            "stigmergy_sensor_warnings_total",
            "amplified" => detection.amplified.to_string()
        )
        .increment(1);
        info!(
            agent_id = %self.id,
            region = %self.region,
            id = %id,
            metric = detection.metric,
            neighbors = detection.neighbor_count,
            amplified = detection.amplified,
            "Emitted warning pheromone"
        );

        data.insert(
            fields::TIMESTAMP.to_string(),
            chrono::Utc::now().timestamp_millis().to_string(),
        );
        self.bus.publish(DashboardEvent::SensorPheromone(PheromoneNotice::new(
            self.id.clone(),
            id,
            data,
        )));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stigmergy_core::domain::feedback::FeedbackType;
    use stigmergy_core::domain::store::StoreError;
    use stigmergy_core::domain::node_config::StreamsConfig;
    use stigmergy_core::infrastructure::in_memory_store::InMemoryStore;

    struct Fixed(f64);

    impl MetricSource for Fixed {
        fn sample(&mut self) -> f64 {
            self.0
        }
    }

    fn log(store: &InMemoryStore) -> EventLog {
        EventLog::new(
            Arc::new(store.clone()),
            StreamsConfig {
                block_ms: 0,
                ..StreamsConfig::default()
            },
        )
    }

    fn sensor(id: &str, metric: f64, log: EventLog, bus: DashboardBus) -> SensorAgent {
        SensorAgent::new(AgentId::new(id), "eu", log, bus, &SensorConfig::default())
            .with_metric_source(Fixed(metric))
            .starting_at(Cursor::beginning())
    }

    async fn warnings(log: &EventLog) -> Vec<BTreeMap<String, String>> {
        log.read_since(LogKind::Warning, "eu", Cursor::beginning())
            .await
            .unwrap()
            .events
            .into_iter()
            .map(|e| e.fields)
            .collect()
    }

    #[tokio::test]
    async fn test_quiet_metric_emits_nothing() {
        let store = InMemoryStore::new();
        let log = log(&store);
        let mut agent = sensor("s1", 0.2, log.clone(), DashboardBus::new(8));

        agent.tick().await.unwrap();
        assert!(warnings(&log).await.is_empty());
    }

    #[tokio::test]
    async fn test_lone_detection_is_not_amplified() {
        let store = InMemoryStore::new();
        let log = log(&store);
        let bus = DashboardBus::new(8);
        let mut receiver = bus.subscribe();
        let mut agent = sensor("s1", 0.9, log.clone(), bus);

        agent.tick().await.unwrap();

        let emitted = warnings(&log).await;
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0]["agentId"], "s1");
        assert_eq!(emitted[0]["metric"], "0.90");
        assert_eq!(emitted[0]["region"], "eu");
        assert_eq!(emitted[0]["amplified"], "false");

        let events = receiver.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "sensorPheromone");
    }

    #[tokio::test]
    async fn test_neighbor_report_amplifies() {
        let store = InMemoryStore::new();
        let log = log(&store);
        let neighbor = BTreeMap::from([("agentId".to_string(), "s2".to_string())]);
        log.append(LogKind::Warning, "eu", neighbor).await.unwrap();

        let mut agent = sensor("s1", 0.9, log.clone(), DashboardBus::new(8));
        agent.tick().await.unwrap();

        let emitted = warnings(&log).await;
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[1]["agentId"], "s1");
        assert_eq!(emitted[1]["amplified"], "true");
    }

    #[tokio::test]
    async fn test_own_reports_are_not_neighbors() {
        let store = InMemoryStore::new();
        let log = log(&store);
        let mut agent = sensor("s1", 0.9, log.clone(), DashboardBus::new(8));

        agent.tick().await.unwrap();
        agent.tick().await.unwrap();

        let emitted = warnings(&log).await;
        assert_eq!(emitted.len(), 2);
        assert!(emitted.iter().all(|f| f["amplified"] == "false"));
    }

    #[tokio::test]
    async fn test_cursor_advances_past_read_events() {
        let store = InMemoryStore::new();
        let log = log(&store);
        let first = log
            .append(LogKind::Warning, "eu", BTreeMap::from([("agentId".to_string(), "s9".to_string())]))
            .await
            .unwrap();

        let mut agent = sensor("s1", 0.1, log, DashboardBus::new(8));
        agent.tick().await.unwrap();
        assert_eq!(agent.cursor(), Cursor::After(first));
    }

    #[tokio::test]
    async fn test_registration() {
        let store = InMemoryStore::new();
        let agent = sensor("s1", 0.1, log(&store), DashboardBus::new(8));
        agent.register(&store).await;
        agent.register(&store).await;
        assert_eq!(SensorRegistry::count(&store, "eu").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_feedback_listener_adjusts_threshold() {
        let store = InMemoryStore::new();
        let agent = sensor("s1", 0.1, log(&store), DashboardBus::new(8));
        let threshold = agent.threshold();
        let shutdown = CancellationToken::new();
        let handle = agent.spawn_feedback_listener(Arc::new(store.clone()), BackoffPolicy::default(), shutdown.clone());

        // wait for the listener to subscribe before publishing
        let id = AgentId::new("s1");
        let mut delivered = 0;
        for _ in 0..50 {
            delivered = store
                .publish(&id, Feedback::new("1-0", FeedbackType::FalsePositive))
                .await
                .unwrap();
            if delivered > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(delivered, 1);

        for _ in 0..50 {
            if (threshold.get() - 0.75).abs() < 1e-9 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!((threshold.get() - 0.75).abs() < 1e-9);

        shutdown.cancel();
        handle.await.unwrap();
    }

    enum FirstAttempt {
        Fail,
        Close,
    }

    /// Feedback bus whose first subscription misbehaves.
    struct FlakyBus {
        inner: InMemoryStore,
        first: FirstAttempt,
        attempts: AtomicUsize,
    }

    impl FlakyBus {
        fn new(inner: InMemoryStore, first: FirstAttempt) -> Self {
            Self {
                inner,
                first,
                attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FeedbackBus for FlakyBus {
        async fn publish(&self, agent: &AgentId, feedback: Feedback) -> Result<usize, StoreError> {
            self.inner.publish(agent, feedback).await
        }

        async fn subscribe(&self, agent: &AgentId) -> Result<BoxStream<'static, Feedback>, StoreError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return match self.first {
                    FirstAttempt::Fail => Err(StoreError::Unavailable("connection refused".to_string())),
                    FirstAttempt::Close => Ok(futures::stream::empty().boxed()),
                };
            }
            self.inner.subscribe(agent).await
        }
    }

    async fn publish_until_delivered(bus: &FlakyBus, id: &AgentId) -> usize {
        for _ in 0..100 {
            let delivered = bus
                .publish(id, Feedback::new("1-0", FeedbackType::FalsePositive))
                .await
                .unwrap();
            if delivered > 0 {
                return delivered;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        0
    }

    async fn assert_resubscribes(first: FirstAttempt) {
        let store = InMemoryStore::new();
        let agent = sensor("s1", 0.1, log(&store), DashboardBus::new(8));
        let threshold = agent.threshold();
        let bus = Arc::new(FlakyBus::new(store, first));
        let shutdown = CancellationToken::new();
        let policy = BackoffPolicy {
            base: Duration::from_millis(200),
            max: Duration::from_secs(2),
            alert_after: 5,
        };
        let handle = agent.spawn_feedback_listener(bus.clone(), policy, shutdown.clone());

        assert_eq!(publish_until_delivered(&bus, &AgentId::new("s1")).await, 1);
        assert!(!handle.is_finished());
        assert_eq!(bus.attempts.load(Ordering::SeqCst), 2);

        for _ in 0..50 {
            if (threshold.get() - 0.75).abs() < 1e-9 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!((threshold.get() - 0.75).abs() < 1e-9);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_listener_retries_failed_subscribe() {
        assert_resubscribes(FirstAttempt::Fail).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_listener_renews_closed_subscription() {
        assert_resubscribes(FirstAttempt::Close).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_listener_stops_while_backing_off() {
        let store = InMemoryStore::new();
        let agent = sensor("s1", 0.1, log(&store), DashboardBus::new(8));
        let bus = Arc::new(FlakyBus::new(store, FirstAttempt::Fail));
        let shutdown = CancellationToken::new();
        let handle = agent.spawn_feedback_listener(bus.clone(), BackoffPolicy::default(), shutdown.clone());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(bus.attempts.load(Ordering::SeqCst), 1);
        shutdown.cancel();
        handle.await.unwrap();
    }
}
