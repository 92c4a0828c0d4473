// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Lease Value Objects
//!
//! A lease is a time-bounded, owner-checked mutual-exclusion record. At most
//! one owner holds a live lease for a key; only that owner can extend or
//! release it. Expiry bounds how long a crashed owner can block others.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::event::EventId;

/// Name of a lease in the lease table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseKey(pub String);

impl LeaseKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// One lease per alert: `lock:alert:<alertId>`.
    pub fn for_alert(alert_id: &EventId) -> Self {
        Self(format!("lock:alert:{}", alert_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
