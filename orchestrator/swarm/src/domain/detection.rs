// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Local detection, neighbor amplification and the adaptive threshold.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use stigmergy_core::domain::event::fields;
use stigmergy_core::domain::feedback::FeedbackType;

pub const MIN_THRESHOLD: f64 = 0.01;
pub const MAX_THRESHOLD: f64 = 0.99;
pub const FEEDBACK_STEP: f64 = 0.05;

/// Detection threshold shared between a sensor's tick and its feedback listener.
///
/// Stored as f64 bits in an atomic. Updates are last-write-wins.
#[derive(Debug, Clone)]
pub struct SharedThreshold(Arc<AtomicU64>);

impl SharedThreshold {
    pub fn new(value: f64) -> Self {
        Self(Arc::new(AtomicU64::new(clamp(value).to_bits())))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f64) -> f64 {
        let value = clamp(value);
        self.0.store(value.to_bits(), Ordering::Relaxed);
        value
    }

    /// Move the threshold one step for an operator verdict. Returns the new value.
    pub fn apply_feedback(&self, feedback: FeedbackType) -> f64 {
        let delta = match feedback {
            FeedbackType::FalsePositive => FEEDBACK_STEP,
            FeedbackType::TruePositive => -FEEDBACK_STEP,
        };
        self.set(self.get() + delta)
    }
}

fn clamp(value: f64) -> f64 {
    if value.is_nan() {
        return MAX_THRESHOLD;
    }
    value.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

/// Outcome of one sensor tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub metric: f64,
    pub local_detected: bool,
    pub neighbor_count: usize,
    pub amplified: bool,
}

impl Detection {
    pub fn assess(metric: f64, threshold: f64, neighbor_count: usize) -> Self {
        let local_detected = metric > threshold;
        Self {
            metric,
            local_detected,
            neighbor_count,
            amplified: local_detected && neighbor_count >= 1,
        }
    }

    pub fn should_emit(&self) -> bool {
        self.local_detected || self.amplified
    }

    pub fn warning_fields(&self, agent_id: &str, region: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (fields::AGENT_ID.to_string(), agent_id.to_string()),
            (fields::METRIC.to_string(), format!("{:.2}", self.metric)),
            (fields::REGION.to_string(), region.to_string()),
            (fields::AMPLIFIED.to_string(), self.amplified.to_string()),
        ])
    }
}
