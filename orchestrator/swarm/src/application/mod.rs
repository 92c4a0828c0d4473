// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Agent loops. One struct per role, each owning its cursor and mutated only
//! by its own supervisor.

pub mod aggregator;
pub mod responder;
pub mod sensor;

pub use aggregator::AggregatorAgent;
pub use responder::ResponderAgent;
pub use sensor::{MetricSource, RandomMetricSource, SensorAgent};
