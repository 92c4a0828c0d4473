// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Event Log Domain Types
//!
//! Immutable records ("pheromones") appended to region-partitioned logs.
//!
//! - [`EventId`]: `<ms>-<seq>` log identifier, totally ordered within a log.
//! - [`Cursor`]: a consumer's position in one log.
//! - [`Event`]: an appended record with its string field map.
//! - [`LogKind`]: the two logs every region carries (`warning`, `alert`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Field names every producer writes.
pub mod fields {
    pub const AGENT_ID: &str = "agentId";
    pub const REGION: &str = "region";
    pub const TIMESTAMP: &str = "timestamp";
    pub const METRIC: &str = "metric";
    pub const AMPLIFIED: &str = "amplified";
    pub const COUNT: &str = "count";
    pub const THRESHOLD: &str = "threshold";
    pub const TYPE: &str = "type";
}

/// Ordered identifier assigned by the log on append.
///
/// Ordering is `(ms, seq)` lexicographic, so ids compare correctly across
/// readers without any knowledge of the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EventId {
    pub ms: u64,
    pub seq: u64,
}

impl EventId {
    pub const ZERO: EventId = EventId { ms: 0, seq: 0 };

    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// Next id to hand out after `self`, given the current wall clock.
    pub fn successor(&self, now_ms: u64) -> Self {
        if now_ms > self.ms {
            Self { ms: now_ms, seq: 0 }
        } else {
            Self { ms: self.ms, seq: self.seq + 1 }
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid event id '{0}', expected <ms>-<seq>")]
pub struct ParseEventIdError(pub String);

impl FromStr for EventId {
    type Err = ParseEventIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ms, seq) = s
            .split_once('-')
            .ok_or_else(|| ParseEventIdError(s.to_string()))?;
        let ms = ms.parse().map_err(|_| ParseEventIdError(s.to_string()))?;
        let seq = seq.parse().map_err(|_| ParseEventIdError(s.to_string()))?;
        Ok(Self { ms, seq })
    }
}

impl Serialize for EventId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Position of a consumer within a single log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cursor {
    /// Sentinel: only events appended after the read starts watching.
    Latest,
    /// Everything strictly after the given id.
    After(EventId),
}

impl Cursor {
    /// Read the whole retained log.
    pub fn beginning() -> Self {
        Cursor::After(EventId::ZERO)
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::Latest
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Latest => f.write_str("$"),
            Cursor::After(id) => id.fmt(f),
        }
    }
}

impl FromStr for Cursor {
    type Err = ParseEventIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "$" {
            Ok(Cursor::Latest)
        } else {
            s.parse().map(Cursor::After)
        }
    }
}

/// Which of the two per-region logs an event lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Warning,
    Alert,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogKind::Warning => f.write_str("warning"),
            LogKind::Alert => f.write_str("alert"),
        }
    }
}

/// Immutable record appended to a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub fields: BTreeMap<String, String>,
    /// Log-side stamp, distinct from the producer `timestamp` field.
    pub appended_at_ms: u64,
}

impl Event {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.field(fields::AGENT_ID)
    }

    pub fn region(&self) -> Option<&str> {
        self.field(fields::REGION)
    }

    /// Producer timestamp in ms; 0 when missing or unparsable.
    pub fn timestamp_ms(&self) -> u64 {
        self.field(fields::TIMESTAMP)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }
}

/// Result of one blocking read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadBatch {
    pub events: Vec<Event>,
    /// Position observed by the read; the consumer's next cursor.
    pub last_seen: EventId,
}

impl ReadBatch {
    pub fn empty(last_seen: EventId) -> Self {
        Self {
            events: Vec::new(),
            last_seen,
        }
    }
}
