// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Backoff Supervisor
//!
//! Generic periodic-task runner shared by every agent loop. A task ticks on a
//! fixed interval; failures pause the schedule with exponential backoff and a
//! long run of failures is flagged for manual intervention. The process never
//! exits on its own: only the shutdown token stops the loop.
//!
//! ## State Machine
//! | State | Event | Next |
//! |-------|-------|------|
//! | Running | tick ok | Running (failures = 0) |
//! | Running | tick err | Backoff(`min(base × 2^failures, max)`) |
//! | Backoff | delay elapsed | Running (schedule restarted) |
//! | any | shutdown | stopped |

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One unit of periodic agent work.
#[async_trait]
pub trait PeriodicTask: Send {
    fn name(&self) -> &str;

    async fn tick(&mut self) -> anyhow::Result<()>;
}

/// Delay schedule applied after failed ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    /// Consecutive failures tolerated before intervention is flagged.
    pub alert_after: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            max: Duration::from_millis(30000),
            alert_after: 5,
        }
    }
}

impl BackoffPolicy {
    /// Pause after the `failures`-th consecutive failure.
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        self.base.checked_mul(factor).unwrap_or(self.max).min(self.max)
    }

    pub fn needs_intervention(&self, failures: u32) -> bool {
        failures > self.alert_after
    }
}

#[async_trait]
pub trait SupervisorObserver: Send + Sync {
    async fn on_tick_succeeded(&self, task: &str);
    async fn on_backoff(&self, task: &str, failures: u32, delay: Duration, error: &str);
    async fn on_intervention_needed(&self, task: &str, failures: u32);
}

/// Default observer: structured logs plus counters.
pub struct TracingObserver;

#[async_trait]
impl SupervisorObserver for TracingObserver {
    async fn on_tick_succeeded(&self, task: &str) {
        debug!(task, "Tick completed");
    }

    async fn on_backoff(&self, task: &str, failures: u32, delay: Duration, error: &str) {
        metrics::counter!("stigmergy_supervisor_failures_total", "task" => task.to_string())
            .increment(1);
        warn!(
            task,
            failures,
            delay_ms = delay.as_millis() as u64,
            error,
            "Tick failed, pausing schedule"
        );
    }

    async fn on_intervention_needed(&self, task: &str, failures: u32) {
        metrics::counter!("stigmergy_supervisor_intervention_total", "task" => task.to_string())
            .increment(1);
        error!(
            task,
            failures,
            needs_intervention = true,
            "Repeated tick failures, manual intervention needed"
        );
    }
}

pub struct BackoffSupervisor {
    policy: BackoffPolicy,
    observer: Arc<dyn SupervisorObserver>,
}

impl BackoffSupervisor {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SupervisorObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    /// Drive `task` until `shutdown` is cancelled.
    ///
    /// The first tick fires one `period` after start. Cancellation interrupts
    /// the interval wait and backoff pauses, never a tick body in flight.
    pub async fn run<T: PeriodicTask>(&self, mut task: T, period: Duration, shutdown: CancellationToken) {
        info!(
            task = task.name(),
            period_ms = period.as_millis() as u64,
            "Starting supervised loop"
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures: u32 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.cancelled() => break,
            }

            match task.tick().await {
                Ok(()) => {
                    if failures > 0 {
                        info!(task = task.name(), failures, "Tick recovered");
                    }
                    failures = 0;
                    self.observer.on_tick_succeeded(task.name()).await;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.policy.delay(failures);
                    self.observer
                        .on_backoff(task.name(), failures, delay, &format!("{:#}", e))
                        .await;
                    if self.policy.needs_intervention(failures) {
                        self.observer.on_intervention_needed(task.name(), failures).await;
                    }

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.cancelled() => break,
                    }
                    ticker.reset();
                }
            }
        }

        info!(task = task.name(), "Supervised loop stopped");
    }
}
