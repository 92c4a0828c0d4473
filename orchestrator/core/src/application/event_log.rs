// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Event Log Transport
//!
//! Region-partitioned `warning` and `alert` logs on top of a [`StreamStore`].
//!
//! - `append` stamps the producer `timestamp`, then trims the log in the
//!   background (best-effort, approximate retention).
//! - `read_since` blocks for new events after a cursor and retries transient
//!   failures with linear backoff before surfacing a [`TransportError`].
//! - `filter_recent` keeps events whose producer timestamp falls inside a window.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::event::{fields, Cursor, Event, EventId, LogKind, ReadBatch};
use crate::domain::node_config::StreamsConfig;
use crate::domain::store::{StoreError, StreamStore};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to append to {stream}: {source}")]
    Append {
        stream: String,
        #[source]
        source: StoreError,
    },

    #[error("Read from {stream} failed after {attempts} attempts: {source}")]
    ReadExhausted {
        stream: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

#[derive(Clone)]
pub struct EventLog {
    store: Arc<dyn StreamStore>,
    config: StreamsConfig,
}

impl EventLog {
    pub fn new(store: Arc<dyn StreamStore>, config: StreamsConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &StreamsConfig {
        &self.config
    }

    /// `<prefix>:<region>`
    pub fn stream_key(&self, kind: LogKind, region: &str) -> String {
        let prefix = match kind {
            LogKind::Warning => &self.config.warning_prefix,
            LogKind::Alert => &self.config.alert_prefix,
        };
        format!("{}:{}", prefix, region)
    }

    /// Append `fields` plus a fresh producer timestamp.
    pub async fn append(
        &self,
        kind: LogKind,
        region: &str,
        mut fields: BTreeMap<String, String>,
    ) -> Result<EventId, TransportError> {
        let stream = self.stream_key(kind, region);
        fields.insert(
            fields::TIMESTAMP.to_string(),
            chrono::Utc::now().timestamp_millis().to_string(),
        );

        let id = self
            .store
            .append(&stream, fields)
            .await
            .map_err(|source| TransportError::Append {
                stream: stream.clone(),
                source,
            })?;

        metrics::counter!("stigmergy_log_appended_total", "log" => kind.to_string()).increment(1);
        info!(stream = %stream, id = %id, "Published {} pheromone", kind);

        self.spawn_trim(stream);
        Ok(id)
    }

    fn spawn_trim(&self, stream: String) {
        let store = self.store.clone();
        let max_len = self.config.retention;
        let limit = self.config.trim_limit;
        tokio::spawn(async move {
            match store.trim(&stream, max_len, limit).await {
                Ok(0) => {}
                Ok(removed) => {
                    metrics::counter!("stigmergy_log_trimmed_total").increment(removed as u64);
                    debug!(stream = %stream, removed, "Trimmed log");
                }
                Err(e) => warn!(stream = %stream, "Log trim failed: {}", e),
            }
        });
    }

    /// Events after `cursor`, oldest first. The caller's next cursor is `last_seen`.
    pub async fn read_since(
        &self,
        kind: LogKind,
        region: &str,
        cursor: Cursor,
    ) -> Result<ReadBatch, TransportError> {
        let stream = self.stream_key(kind, region);
        let max_retries = self.config.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self
                .store
                .read(&stream, cursor, self.config.read_count, self.config.block())
                .await
            {
                Ok(batch) => return Ok(batch),
                Err(source) if attempt >= max_retries => {
                    return Err(TransportError::ReadExhausted {
                        stream,
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    let backoff = self.config.retry_base() * attempt;
                    warn!(
                        stream = %stream,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Stream read failed: {}",
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Events whose producer timestamp is within `window` of now.
pub fn filter_recent(events: &[Event], window: Duration) -> Vec<Event> {
    let now_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
    filter_recent_at(events, window, now_ms)
}

/// [`filter_recent`] against an explicit clock. Timestamps in the future count as recent.
pub fn filter_recent_at(events: &[Event], window: Duration, now_ms: u64) -> Vec<Event> {
    let window_ms = window.as_millis() as u64;
    events
        .iter()
        .filter(|event| now_ms.saturating_sub(event.timestamp_ms()) <= window_ms)
        .cloned()
        .collect()
}
