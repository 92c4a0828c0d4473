// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: value objects, store interfaces and the backoff supervisor.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types shared by every agent role, free of transport concerns

pub mod agent;
pub mod event;
pub mod events;
pub mod feedback;
pub mod lease;
pub mod node_config;
pub mod store;
pub mod supervisor;
