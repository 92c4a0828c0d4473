// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for a running node's control API

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ControlClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSummary {
    #[serde(rename = "usedMemory")]
    pub used_memory: String,
    pub streams: usize,
    pub events: usize,
    pub leases: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub store: Option<StoreSummary>,
    #[serde(default)]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

impl ControlClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Unhealthy nodes answer 500 with a report body, which is returned as is.
    pub async fn health(&self) -> Result<HealthReport> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .with_context(|| format!("Failed to reach node at {}", self.base_url))?;

        response
            .json()
            .await
            .context("Failed to parse health response")
    }

    /// Returns the region the anomaly was injected into.
    pub async fn trigger(&self, region: Option<&str>) -> Result<String> {
        #[derive(Serialize)]
        struct TriggerRequest<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            region: Option<&'a str>,
        }

        let response = self
            .client
            .post(format!("{}/trigger", self.base_url))
            .json(&TriggerRequest { region })
            .send()
            .await
            .context("Failed to trigger anomaly")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to trigger anomaly: {}", error_text);
        }

        #[derive(Deserialize)]
        struct TriggerResponse {
            region: String,
        }

        let trigger: TriggerResponse = response
            .json()
            .await
            .context("Failed to parse trigger response")?;
        Ok(trigger.region)
    }

    /// Returns how many live subscribers received the feedback.
    pub async fn feedback(&self, agent_id: &str, detection_id: &str, feedback_type: &str) -> Result<usize> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct FeedbackRequest<'a> {
            agent_id: &'a str,
            detection_id: &'a str,
            feedback_type: &'a str,
        }

        let response = self
            .client
            .post(format!("{}/feedback", self.base_url))
            .json(&FeedbackRequest {
                agent_id,
                detection_id,
                feedback_type,
            })
            .send()
            .await
            .context("Failed to send feedback")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to send feedback: {}", error_text);
        }

        #[derive(Deserialize)]
        struct FeedbackResponse {
            #[serde(default)]
            delivered: usize,
        }

        let sent: FeedbackResponse = response
            .json()
            .await
            .context("Failed to parse feedback response")?;
        Ok(sent.delivered)
    }
}
