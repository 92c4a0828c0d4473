// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # `stigmergy-swarm`: Agent Behaviors
//!
//! The three cooperating roles of the swarm. Agents never talk to each other
//! directly; they coordinate through the region's warning and alert logs and
//! through per-alert leases.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | quorum arithmetic, detection and threshold adaptation, remediation plan |
//! | [`application`] | Application | `SensorAgent`, `AggregatorAgent`, `ResponderAgent` |
//!
//! Each agent implements [`stigmergy_core::domain::supervisor::PeriodicTask`]
//! and is driven by a `BackoffSupervisor`.

pub mod application;
pub mod domain;

pub use domain::*;
