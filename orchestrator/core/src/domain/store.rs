// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Shared Store Interfaces
//!
//! The log transport and the lease table are the only resources agents share.
//! Each concern has its own trait, defined here and implemented in
//! `crate::infrastructure`.
//!
//! | Trait | Concern | Implementations |
//! |-------|---------|----------------|
//! | `StreamStore` | append / blocking read / trim of ordered logs | `InMemoryStore`, `HttpStore` |
//! | `LeaseStore` | set-if-absent with TTL, owner-checked extend and delete | `InMemoryStore`, `HttpStore` |
//! | `SensorRegistry` | per-region set of live sensors | `InMemoryStore`, `HttpStore` |
//! | `FeedbackBus` | fire-and-forget feedback fan-out | `InMemoryStore`, `HttpStore` |
//! | `StoreHealth` | size statistics for `/health` | `InMemoryStore`, `HttpStore` |
//!
//! Every mutation is a single-key atomic operation; nothing here needs a
//! multi-key transaction.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::agent::AgentId;
use crate::domain::event::{Cursor, EventId, ReadBatch};
use crate::domain::feedback::Feedback;

/// Ordered, append-only logs keyed by stream name.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Append fields, returning the id assigned by the log.
    async fn append(
        &self,
        stream: &str,
        fields: BTreeMap<String, String>,
    ) -> Result<EventId, StoreError>;

    /// Events strictly after `cursor`, oldest first, at most `count`.
    ///
    /// Waits up to `block` for the first new event when none is available.
    async fn read(
        &self,
        stream: &str,
        cursor: Cursor,
        count: usize,
        block: Duration,
    ) -> Result<ReadBatch, StoreError>;

    /// Drop the oldest entries beyond `max_len`, removing at most `limit` per call.
    async fn trim(&self, stream: &str, max_len: usize, limit: usize) -> Result<usize, StoreError>;
}

/// Keyed records with an owner and an expiry.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Set the lease only if no live lease exists for `key`.
    async fn try_acquire(&self, key: &str, owner: &AgentId, ttl: Duration)
        -> Result<bool, StoreError>;

    /// Refresh the TTL only if `owner` holds the live lease.
    async fn extend_if_owner(
        &self,
        key: &str,
        owner: &AgentId,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Delete the lease only if `owner` holds it.
    async fn release_if_owner(&self, key: &str, owner: &AgentId) -> Result<bool, StoreError>;
}

/// Dynamic sensor membership per region.
#[async_trait]
pub trait SensorRegistry: Send + Sync {
    async fn register(&self, region: &str, agent: &AgentId) -> Result<(), StoreError>;

    async fn count(&self, region: &str) -> Result<usize, StoreError>;
}

/// Per-agent feedback channel. Delivery is at-most-once and not persisted.
#[async_trait]
pub trait FeedbackBus: Send + Sync {
    /// Returns the number of subscribers the message reached.
    async fn publish(&self, agent: &AgentId, feedback: Feedback) -> Result<usize, StoreError>;

    async fn subscribe(
        &self,
        agent: &AgentId,
    ) -> Result<BoxStream<'static, Feedback>, StoreError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Size snapshot of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub streams: usize,
    pub events: usize,
    pub leases: usize,
    pub approx_memory_bytes: u64,
}

impl StoreStats {
    /// Memory figure formatted the way the health endpoint reports it.
    pub fn used_memory_display(&self) -> String {
        format!("{:.2}MB", self.approx_memory_bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Store errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid store request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_used_memory_display() {
        let stats = StoreStats {
            approx_memory_bytes: 3 * 1024 * 1024 + 512 * 1024,
            ..Default::default()
        };
        assert_eq!(stats.used_memory_display(), "3.50MB");
    }
}
