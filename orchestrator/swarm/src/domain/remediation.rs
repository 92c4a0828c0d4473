// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Remediation plan: the ordered phases a responder runs while holding an
//! alert's lease. Phases are fixed-duration placeholders for real isolation
//! and scanning actions.

use std::fmt;
use std::time::Duration;

use stigmergy_core::domain::node_config::ResponderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Isolate,
    Scan,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Isolate => "isolate",
            PhaseKind::Scan => "scan",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemediationPhase {
    pub kind: PhaseKind,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationPlan {
    phases: Vec<RemediationPhase>,
}

impl RemediationPlan {
    pub fn new(isolation: Duration, scan: Duration) -> Self {
        Self {
            phases: vec![
                RemediationPhase {
                    kind: PhaseKind::Isolate,
                    duration: isolation,
                },
                RemediationPhase {
                    kind: PhaseKind::Scan,
                    duration: scan,
                },
            ],
        }
    }

    pub fn from_config(config: &ResponderConfig) -> Self {
        Self::new(
            Duration::from_millis(config.isolation_ms),
            Duration::from_millis(config.scan_ms),
        )
    }

    pub fn phases(&self) -> &[RemediationPhase] {
        &self.phases
    }

    pub fn total_duration(&self) -> Duration {
        self.phases.iter().map(|phase| phase.duration).sum()
    }
}
