// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Quorum Arithmetic
//!
//! An alert is warranted when enough distinct sensors report within the
//! sliding window. Nothing here is stateful: the decision is recomputed from
//! the current window every tick.

use std::collections::BTreeSet;

use stigmergy_core::domain::event::Event;

/// Guards `ceil` against products like `10 × 0.7 = 7.000000000000001`.
const EPSILON: f64 = 1e-9;

/// Minimum number of distinct reporters for `total` sensors at `ratio`.
///
/// Never below 1, so an empty window cannot reach quorum. A non-finite
/// product also yields 1.
pub fn threshold_count(total_sensors: usize, ratio: f64) -> usize {
    let raw = total_sensors as f64 * ratio;
    let count = (raw - EPSILON).ceil();
    if !count.is_finite() || count < 1.0 {
        1
    } else {
        count as usize
    }
}

/// Distinct `agentId` values among `events`, optionally ignoring one agent.
pub fn distinct_agents(events: &[Event], exclude: Option<&str>) -> usize {
    events
        .iter()
        .filter_map(Event::agent_id)
        .filter(|agent| Some(*agent) != exclude)
        .collect::<BTreeSet<_>>()
        .len()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumDecision {
    /// Sensor count unknown or zero, or a ratio outside (0, 1]; nothing was evaluated.
    Unknown,
    NotReached { unique: usize, threshold: usize },
    Reached { unique: usize, threshold: usize },
}

impl QuorumDecision {
    pub fn evaluate(total_sensors: usize, ratio: f64, recent: &[Event]) -> Self {
        if total_sensors == 0 || !(ratio > 0.0 && ratio <= 1.0) {
            return QuorumDecision::Unknown;
        }
        let threshold = threshold_count(total_sensors, ratio);
        let unique = distinct_agents(recent, None);
        if unique >= threshold {
            QuorumDecision::Reached { unique, threshold }
        } else {
            QuorumDecision::NotReached { unique, threshold }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use stigmergy_core::domain::event::EventId;

    fn warnings(agents: &[&str]) -> Vec<Event> {
        agents
            .iter()
            .enumerate()
            .map(|(i, agent)| Event {
                id: EventId::new(1, i as u64),
                fields: BTreeMap::from([("agentId".to_string(), agent.to_string())]),
                appended_at_ms: 1,
            })
            .collect()
    }

    #[test]
    fn test_threshold_count() {
        assert_eq!(threshold_count(10, 0.7), 7);
        assert_eq!(threshold_count(3, 0.7), 3);
        assert_eq!(threshold_count(4, 0.5), 2);
        assert_eq!(threshold_count(5, 0.5), 3);
        assert_eq!(threshold_count(1, 0.01), 1);
        assert_eq!(threshold_count(10, 1.0), 10);
        assert_eq!(threshold_count(0, 0.7), 1);
    }

    #[test]
    fn test_threshold_count_non_finite_ratio() {
        assert_eq!(threshold_count(10, f64::NAN), 1);
        assert_eq!(threshold_count(10, f64::INFINITY), 1);
        assert_eq!(threshold_count(10, f64::NEG_INFINITY), 1);
    }

    #[test]
    fn test_unusable_ratio_is_unknown() {
        let recent = warnings(&["s1", "s2", "s3"]);
        assert_eq!(QuorumDecision::evaluate(10, f64::NAN, &recent), QuorumDecision::Unknown);
        assert_eq!(QuorumDecision::evaluate(10, 0.0, &recent), QuorumDecision::Unknown);
        assert_eq!(QuorumDecision::evaluate(10, 1.5, &recent), QuorumDecision::Unknown);
    }

    #[test]
    fn test_six_of_ten_is_not_quorum() {
        let recent = warnings(&["s1", "s2", "s3", "s4", "s5", "s6", "s6", "s1"]);
        assert_eq!(
            QuorumDecision::evaluate(10, 0.7, &recent),
            QuorumDecision::NotReached { unique: 6, threshold: 7 }
        );
    }

    #[test]
    fn test_seven_of_ten_is_quorum() {
        let recent = warnings(&["s1", "s2", "s3", "s4", "s5", "s6", "s7"]);
        assert_eq!(
            QuorumDecision::evaluate(10, 0.7, &recent),
            QuorumDecision::Reached { unique: 7, threshold: 7 }
        );
    }

    #[test]
    fn test_unknown_sensor_count_skips() {
        let recent = warnings(&["s1"]);
        assert_eq!(QuorumDecision::evaluate(0, 0.7, &recent), QuorumDecision::Unknown);
    }

    #[test]
    fn test_distinct_agents_excludes_self() {
        let recent = warnings(&["me", "n1", "n1", "n2"]);
        assert_eq!(distinct_agents(&recent, Some("me")), 2);
        assert_eq!(distinct_agents(&recent, None), 3);
        assert_eq!(distinct_agents(&warnings(&["me"]), Some("me")), 0);
    }
}
