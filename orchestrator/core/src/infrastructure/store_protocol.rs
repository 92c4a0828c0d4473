// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Request and response bodies shared by the store server and [`HttpStore`].
//!
//! [`HttpStore`]: crate::infrastructure::http_store::HttpStore

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::agent::AgentId;
use crate::domain::event::EventId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendRequest {
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendResponse {
    pub id: EventId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadQuery {
    /// `$` or an event id
    #[serde(default = "default_cursor")]
    pub cursor: String,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub block_ms: u64,
}

fn default_cursor() -> String {
    "$".to_string()
}

fn default_count() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimRequest {
    pub max_len: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimResponse {
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRequest {
    pub owner: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub agent_id: AgentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResponse {
    pub delivered: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Decode the payload of one Server-Sent Events `data:` line.
///
/// Comments, `event:`/`id:` fields and payloads that fail to decode yield `None`.
pub fn parse_sse_data<T: DeserializeOwned>(line: &str) -> Option<T> {
    let payload = line.strip_prefix("data:")?.trim_start();
    serde_json::from_str(payload).ok()
}

/// Splits an SSE byte stream into lines. Bytes are buffered until a full
/// line arrives, so a character split across network chunks decodes intact.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            lines.push(text.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }
}
