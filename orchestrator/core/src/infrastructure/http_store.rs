// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for a shared store server (`stigmergy store serve`).
//!
//! Implements every store trait by forwarding to the server, which runs each
//! operation atomically against its own in-memory state.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::agent::AgentId;
use crate::domain::event::{Cursor, EventId, ReadBatch};
use crate::domain::feedback::Feedback;
use crate::domain::store::{
    FeedbackBus, LeaseStore, SensorRegistry, StoreError, StoreHealth, StoreStats, StreamStore,
};
use crate::infrastructure::store_protocol::{
    parse_sse_data, AppendRequest, AppendResponse, CountResponse, LeaseRequest, LeaseResponse,
    PublishResponse, RegisterRequest, SseLineBuffer, TrimRequest, TrimResponse,
};

/// Extra time granted to a blocking read on top of its block duration.
const READ_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpStore {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::InvalidRequest(format!("invalid store url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidRequest(format!(
                "store url '{}' cannot be a base",
                base_url
            )));
        }

        let client = Client::builder()
            // No global timeout: feedback subscriptions are long-lived
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidRequest("store url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::BAD_REQUEST => StoreError::InvalidRequest(error_text),
            _ => StoreError::Unavailable(format!("store returned {}: {}", status, error_text)),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> Result<T, StoreError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let response =
            Self::send(self.client.post(url).timeout(self.request_timeout).json(body)).await?;
        Self::decode(response).await
    }

    async fn lease_call(
        &self,
        key: &str,
        action: &str,
        owner: &AgentId,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let request = LeaseRequest {
            owner: owner.clone(),
            ttl_ms: ttl.map(|ttl| ttl.as_millis() as u64),
        };
        let response: LeaseResponse = self.post_json(&["leases", key, action], &request).await?;
        Ok(response.ok)
    }
}

#[async_trait]
impl StreamStore for HttpStore {
    async fn append(
        &self,
        stream: &str,
        fields: BTreeMap<String, String>,
    ) -> Result<EventId, StoreError> {
        let response: AppendResponse = self
            .post_json(&["streams", stream, "entries"], &AppendRequest { fields })
            .await?;
        Ok(response.id)
    }

    async fn read(
        &self,
        stream: &str,
        cursor: Cursor,
        count: usize,
        block: Duration,
    ) -> Result<ReadBatch, StoreError> {
        let url = self.endpoint(&["streams", stream, "entries"])?;
        let request = self
            .client
            .get(url)
            .query(&[
                ("cursor", cursor.to_string()),
                ("count", count.to_string()),
                ("block_ms", block.as_millis().to_string()),
            ])
            .timeout(block + READ_GRACE);
        Self::decode(Self::send(request).await?).await
    }

    async fn trim(&self, stream: &str, max_len: usize, limit: usize) -> Result<usize, StoreError> {
        let response: TrimResponse = self
            .post_json(&["streams", stream, "trim"], &TrimRequest { max_len, limit })
            .await?;
        Ok(response.removed)
    }
}

#[async_trait]
impl LeaseStore for HttpStore {
    async fn try_acquire(
        &self,
        key: &str,
        owner: &AgentId,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.lease_call(key, "acquire", owner, Some(ttl)).await
    }

    async fn extend_if_owner(
        &self,
        key: &str,
        owner: &AgentId,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.lease_call(key, "extend", owner, Some(ttl)).await
    }

    async fn release_if_owner(&self, key: &str, owner: &AgentId) -> Result<bool, StoreError> {
        self.lease_call(key, "release", owner, None).await
    }
}

#[async_trait]
impl SensorRegistry for HttpStore {
    async fn register(&self, region: &str, agent: &AgentId) -> Result<(), StoreError> {
        let url = self.endpoint(&["registry", region, "sensors"])?;
        let request = RegisterRequest {
            agent_id: agent.clone(),
        };
        Self::send(self.client.post(url).timeout(self.request_timeout).json(&request)).await?;
        Ok(())
    }

    async fn count(&self, region: &str) -> Result<usize, StoreError> {
        let url = self.endpoint(&["registry", region, "sensors", "count"])?;
        let response: CountResponse =
            Self::decode(Self::send(self.client.get(url).timeout(self.request_timeout)).await?)
                .await?;
        Ok(response.count)
    }
}

#[async_trait]
impl FeedbackBus for HttpStore {
    async fn publish(&self, agent: &AgentId, feedback: Feedback) -> Result<usize, StoreError> {
        let response: PublishResponse = self
            .post_json(&["feedback", agent.as_str()], &feedback)
            .await?;
        Ok(response.delivered)
    }

    async fn subscribe(
        &self,
        agent: &AgentId,
    ) -> Result<BoxStream<'static, Feedback>, StoreError> {
        let url = self.endpoint(&["feedback", agent.as_str(), "subscribe"])?;
        let response = Self::send(self.client.get(url)).await?;
        debug!(agent_id = %agent, "Subscribed to feedback stream");

        let bytes = response.bytes_stream().boxed();
        let messages = stream::unfold(
            (bytes, SseLineBuffer::new(), VecDeque::new()),
            |(mut bytes, mut lines, mut ready)| async move {
                loop {
                    if let Some(feedback) = ready.pop_front() {
                        return Some((feedback, (bytes, lines, ready)));
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => {
                            ready.extend(
                                lines
                                    .push(&chunk)
                                    .iter()
                                    .filter_map(|line| parse_sse_data::<Feedback>(line)),
                            );
                        }
                        Some(Err(e)) => {
                            warn!("Feedback stream interrupted: {}", e);
                            return None;
                        }
                        None => return None,
                    }
                }
            },
        );
        Ok(messages.boxed())
    }
}

#[async_trait]
impl StoreHealth for HttpStore {
    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let url = self.endpoint(&["stats"])?;
        Self::decode(Self::send(self.client.get(url).timeout(self.request_timeout)).await?).await
    }
}
