// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod http_store;
pub mod in_memory_store;
pub mod store_protocol;

pub use event_bus::{DashboardBus, DashboardBusError, DashboardReceiver};
pub use http_store::HttpStore;
pub use in_memory_store::InMemoryStore;
