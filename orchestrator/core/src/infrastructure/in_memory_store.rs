// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! In-Memory Store
//!
//! Single-process implementation of every store trait. Used embedded (demo
//! mode, tests) and as the backing state of the store server.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Logs, leases, registry and feedback fan-out behind one mutex
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! Every operation takes the state lock once, so conditional lease writes are
//! atomic. Blocking reads park on a [`Notify`] that each append wakes. Lease
//! expiry uses the tokio clock; expired records are purged on acquire and on
//! stats, and feedback channels are dropped once no subscriber remains.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;

use crate::domain::agent::AgentId;
use crate::domain::event::{Cursor, Event, EventId, ReadBatch};
use crate::domain::feedback::Feedback;
use crate::domain::store::{
    FeedbackBus, LeaseStore, SensorRegistry, StoreError, StoreHealth, StoreStats, StreamStore,
};

const FEEDBACK_CHANNEL_CAPACITY: usize = 64;
const ENTRY_OVERHEAD_BYTES: u64 = 64;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    appended: Notify,
    feedback: Mutex<HashMap<String, broadcast::Sender<Feedback>>>,
}

#[derive(Default)]
struct State {
    streams: HashMap<String, StreamLog>,
    leases: HashMap<String, LeaseRecord>,
    registry: HashMap<String, BTreeSet<String>>,
}

#[derive(Default)]
struct StreamLog {
    entries: VecDeque<Event>,
    last_id: EventId,
}

impl StreamLog {
    fn after(&self, after: EventId, count: usize) -> Vec<Event> {
        // entries are sorted by id, skip the prefix at or before the cursor
        let start = self.entries.partition_point(|e| e.id <= after);
        self.entries.iter().skip(start).take(count).cloned().collect()
    }
}

struct LeaseRecord {
    owner: AgentId,
    expires_at: Instant,
}

impl LeaseRecord {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of retained entries in a stream.
    pub fn stream_len(&self, stream: &str) -> usize {
        self.inner
            .state
            .lock()
            .streams
            .get(stream)
            .map_or(0, |log| log.entries.len())
    }

    /// Current owner of a live lease, if any.
    pub fn lease_owner(&self, key: &str) -> Option<AgentId> {
        let now = Instant::now();
        self.inner
            .state
            .lock()
            .leases
            .get(key)
            .filter(|record| record.is_live(now))
            .map(|record| record.owner.clone())
    }

    #[cfg(test)]
    fn lease_records(&self) -> usize {
        self.inner.state.lock().leases.len()
    }

    #[cfg(test)]
    fn feedback_channels(&self) -> usize {
        self.inner.feedback.lock().len()
    }

    fn resolve(&self, stream: &str, cursor: Cursor) -> EventId {
        match cursor {
            Cursor::After(id) => id,
            Cursor::Latest => self
                .inner
                .state
                .lock()
                .streams
                .get(stream)
                .map_or(EventId::ZERO, |log| log.last_id),
        }
    }
}

impl State {
    /// Alert keys are never re-acquired, so records of crashed owners would
    /// otherwise stay forever.
    fn purge_expired_leases(&mut self, now: Instant) {
        self.leases.retain(|_, record| record.is_live(now));
    }
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[async_trait]
impl StreamStore for InMemoryStore {
    async fn append(
        &self,
        stream: &str,
        fields: BTreeMap<String, String>,
    ) -> Result<EventId, StoreError> {
        if stream.is_empty() {
            return Err(StoreError::InvalidRequest("stream key cannot be empty".to_string()));
        }

        let id = {
            let mut state = self.inner.state.lock();
            let log = state.streams.entry(stream.to_string()).or_default();
            let id = log.last_id.successor(now_ms());
            log.last_id = id;
            log.entries.push_back(Event {
                id,
                fields,
                appended_at_ms: id.ms,
            });
            id
        };

        self.inner.appended.notify_waiters();
        Ok(id)
    }

    async fn read(
        &self,
        stream: &str,
        cursor: Cursor,
        count: usize,
        block: Duration,
    ) -> Result<ReadBatch, StoreError> {
        if count == 0 {
            return Err(StoreError::InvalidRequest("count must be greater than zero".to_string()));
        }

        let after = self.resolve(stream, cursor);
        let deadline = Instant::now() + block;

        loop {
            // register interest before looking, so an append in between still wakes us
            let notified = self.inner.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let events = self
                .inner
                .state
                .lock()
                .streams
                .get(stream)
                .map(|log| log.after(after, count))
                .unwrap_or_default();

            if let Some(last) = events.last() {
                let last_seen = last.id;
                return Ok(ReadBatch { events, last_seen });
            }

            if block.is_zero() || tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(ReadBatch::empty(after));
            }
        }
    }

    async fn trim(&self, stream: &str, max_len: usize, limit: usize) -> Result<usize, StoreError> {
        let mut state = self.inner.state.lock();
        let Some(log) = state.streams.get_mut(stream) else {
            return Ok(0);
        };
        let excess = log.entries.len().saturating_sub(max_len);
        let removed = excess.min(limit);
        log.entries.drain(..removed);
        Ok(removed)
    }
}

#[async_trait]
impl LeaseStore for InMemoryStore {
    async fn try_acquire(
        &self,
        key: &str,
        owner: &AgentId,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        state.purge_expired_leases(now);
        if state.leases.contains_key(key) {
            return Ok(false);
        }
        state.leases.insert(
            key.to_string(),
            LeaseRecord {
                owner: owner.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn extend_if_owner(
        &self,
        key: &str,
        owner: &AgentId,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        match state.leases.get_mut(key) {
            Some(record) if record.is_live(now) && &record.owner == owner => {
                record.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_if_owner(&self, key: &str, owner: &AgentId) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let Some(record) = state.leases.get(key) else {
            return Ok(false);
        };
        if !record.is_live(now) {
            state.leases.remove(key);
            return Ok(false);
        }
        if &record.owner != owner {
            return Ok(false);
        }
        state.leases.remove(key);
        Ok(true)
    }
}

#[async_trait]
impl SensorRegistry for InMemoryStore {
    async fn register(&self, region: &str, agent: &AgentId) -> Result<(), StoreError> {
        self.inner
            .state
            .lock()
            .registry
            .entry(region.to_string())
            .or_default()
            .insert(agent.as_str().to_string());
        Ok(())
    }

    async fn count(&self, region: &str) -> Result<usize, StoreError> {
        Ok(self
            .inner
            .state
            .lock()
            .registry
            .get(region)
            .map_or(0, BTreeSet::len))
    }
}

#[async_trait]
impl FeedbackBus for InMemoryStore {
    async fn publish(&self, agent: &AgentId, feedback: Feedback) -> Result<usize, StoreError> {
        let mut channels = self.inner.feedback.lock();
        let Some(sender) = channels.get(agent.as_str()) else {
            return Ok(0);
        };
        if sender.receiver_count() == 0 {
            channels.remove(agent.as_str());
            return Ok(0);
        }
        Ok(sender.send(feedback).unwrap_or(0))
    }

    async fn subscribe(
        &self,
        agent: &AgentId,
    ) -> Result<BoxStream<'static, Feedback>, StoreError> {
        let receiver = self
            .inner
            .feedback
            .lock()
            .entry(agent.as_str().to_string())
            .or_insert_with(|| broadcast::channel(FEEDBACK_CHANNEL_CAPACITY).0)
            .subscribe();

        Ok(BroadcastStream::new(receiver)
            .filter_map(|message| async move { message.ok() })
            .boxed())
    }
}

#[async_trait]
impl StoreHealth for InMemoryStore {
    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        state.purge_expired_leases(now);

        let mut events = 0usize;
        let mut bytes = 0u64;
        for (key, log) in &state.streams {
            events += log.entries.len();
            bytes += key.len() as u64;
            for event in &log.entries {
                bytes += ENTRY_OVERHEAD_BYTES;
                bytes += event
                    .fields
                    .iter()
                    .map(|(k, v)| (k.len() + v.len()) as u64)
                    .sum::<u64>();
            }
        }
        let leases = state.leases.len();
        bytes += state.leases.keys().map(|k| k.len() as u64 + ENTRY_OVERHEAD_BYTES).sum::<u64>();

        Ok(StoreStats {
            streams: state.streams.len(),
            events,
            leases,
            approx_memory_bytes: bytes,
        })
    }
}
