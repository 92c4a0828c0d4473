// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Layer
//!
//! Pure decision logic. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`quorum`] | `QuorumDecision`, `threshold_count` |
//! | [`detection`] | `Detection`, `SharedThreshold` |
//! | [`remediation`] | `RemediationPlan`, `PhaseKind` |

pub mod detection;
pub mod quorum;
pub mod remediation;

pub use detection::{Detection, SharedThreshold};
pub use quorum::{distinct_agents, threshold_count, QuorumDecision};
pub use remediation::{PhaseKind, RemediationPhase, RemediationPlan};
