// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Store Factory - Application Layer
//!
//! Creates the concrete store implementations for the configured backend.
//! Domain code only sees the traits from `crate::domain::store`.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Select `InMemoryStore` or `HttpStore` from `spec.store.url`

use std::sync::Arc;
use std::time::Duration;

use crate::domain::node_config::StoreConfig;
use crate::domain::store::{
    FeedbackBus, LeaseStore, SensorRegistry, StoreError, StoreHealth, StreamStore,
};
use crate::infrastructure::http_store::HttpStore;
use crate::infrastructure::in_memory_store::InMemoryStore;

/// Storage backend for the shared logs and leases
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Embedded store, only visible to agents in this process
    InMemory,
    /// Remote store server
    Http { url: String, request_timeout: Duration },
}

impl StoreBackend {
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        if config.is_embedded() {
            return Ok(StoreBackend::InMemory);
        }
        if config.url.starts_with("http://") || config.url.starts_with("https://") {
            return Ok(StoreBackend::Http {
                url: config.url.clone(),
                request_timeout: Duration::from_millis(config.request_timeout_ms),
            });
        }
        Err(StoreError::InvalidRequest(format!(
            "unsupported store url '{}'",
            config.url
        )))
    }
}

/// Every store concern as a trait object, all backed by the same store.
#[derive(Clone)]
pub struct Stores {
    pub streams: Arc<dyn StreamStore>,
    pub leases: Arc<dyn LeaseStore>,
    pub registry: Arc<dyn SensorRegistry>,
    pub feedback: Arc<dyn FeedbackBus>,
    pub health: Arc<dyn StoreHealth>,
}

impl Stores {
    pub fn in_memory(store: InMemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            streams: store.clone(),
            leases: store.clone(),
            registry: store.clone(),
            feedback: store.clone(),
            health: store,
        }
    }

    pub fn http(store: HttpStore) -> Self {
        let store = Arc::new(store);
        Self {
            streams: store.clone(),
            leases: store.clone(),
            registry: store.clone(),
            feedback: store.clone(),
            health: store,
        }
    }
}

/// Creates the store bundle for the configured backend
pub fn create_stores(backend: &StoreBackend) -> Result<Stores, StoreError> {
    match backend {
        StoreBackend::InMemory => Ok(Stores::in_memory(InMemoryStore::new())),
        StoreBackend::Http {
            url,
            request_timeout,
        } => Ok(Stores::http(HttpStore::new(url, *request_timeout)?)),
    }
}
