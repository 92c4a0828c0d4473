// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Lease Manager
//!
//! Acquire, extend and release named leases for one owner.
//!
//! Every operation answers a single question: does the caller hold the lease
//! now? Store failures collapse into `false` so a caller never remediates
//! without a lease. The cause is still recorded: the
//! `stigmergy_lease_operations_total` counter carries an `outcome` label of
//! `ok`, `contended` or `store_error`.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::agent::AgentId;
use crate::domain::lease::LeaseKey;
use crate::domain::store::{LeaseStore, StoreError};

#[derive(Clone)]
pub struct LeaseManager {
    store: Arc<dyn LeaseStore>,
    owner: AgentId,
    ttl: Duration,
}

impl LeaseManager {
    pub fn new(store: Arc<dyn LeaseStore>, owner: AgentId, ttl: Duration) -> Self {
        Self { store, owner, ttl }
    }

    pub fn owner(&self) -> &AgentId {
        &self.owner
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Set the lease if no live lease exists. Never waits for availability.
    pub async fn acquire(&self, key: &LeaseKey) -> bool {
        let result = self.store.try_acquire(key.as_str(), &self.owner, self.ttl).await;
        self.settle("acquire", key, result)
    }

    /// Refresh the TTL if we still own the lease. `None` uses the manager's TTL.
    pub async fn extend(&self, key: &LeaseKey, ttl: Option<Duration>) -> bool {
        let ttl = ttl.unwrap_or(self.ttl);
        let result = self.store.extend_if_owner(key.as_str(), &self.owner, ttl).await;
        self.settle("extend", key, result)
    }

    /// Delete the lease if we still own it.
    pub async fn release(&self, key: &LeaseKey) -> bool {
        let result = self.store.release_if_owner(key.as_str(), &self.owner).await;
        self.settle("release", key, result)
    }

    fn settle(&self, operation: &'static str, key: &LeaseKey, result: Result<bool, StoreError>) -> bool {
        let (held, outcome) = match result {
            Ok(true) => (true, "ok"),
            Ok(false) => {
                debug!(key = %key, owner = %self.owner, operation, "Lease not held");
                (false, "contended")
            }
            Err(e) => {
                warn!(key = %key, owner = %self.owner, operation, "Lease store error: {}", e);
                (false, "store_error")
            }
        };
        metrics::counter!(
            "stigmergy_lease_operations_total",
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
        held
    }
}
