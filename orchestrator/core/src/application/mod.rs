// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod event_log;
pub mod lease_manager;
pub mod simulator;
pub mod store_factory;

// Re-export services for convenience
pub use event_log::{filter_recent, filter_recent_at, EventLog, TransportError};
pub use lease_manager::LeaseManager;
pub use simulator::AnomalySimulator;
pub use store_factory::{create_stores, StoreBackend, Stores};
