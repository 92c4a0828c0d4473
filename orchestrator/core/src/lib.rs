// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Stigmergy core
//!
//! Shared log transport, leases, configuration and HTTP surfaces used by
//! every agent role.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Everything agents share except their behaviors

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
