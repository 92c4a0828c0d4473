// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Control API hosted by every agent process.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/health` | store reachability and memory figure |
//! | POST | `/trigger` | inject a manual anomaly for a region |
//! | POST | `/feedback` | forward an operator verdict to a sensor |
//! | GET | `/events` | dashboard notifications as Server-Sent Events |
//!
//! None of these touch detection or remediation logic directly; failures
//! surface as a status payload, never as a failed agent.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::application::simulator::AnomalySimulator;
use crate::domain::agent::AgentId;
use crate::domain::feedback::{Feedback, FeedbackType};
use crate::domain::store::{FeedbackBus, StoreHealth};
use crate::infrastructure::event_bus::DashboardBus;

#[derive(Clone)]
pub struct AppState {
    pub region: String,
    pub health: Arc<dyn StoreHealth>,
    pub feedback: Arc<dyn FeedbackBus>,
    pub simulator: AnomalySimulator,
    pub bus: DashboardBus,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/trigger", post(trigger_handler))
        .route("/feedback", post(feedback_handler))
        .route("/events", get(events_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.health.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "region": state.region,
                "store": {
                    "usedMemory": stats.used_memory_display(),
                    "streams": stats.streams,
                    "events": stats.events,
                    "leases": stats.leases,
                },
            })),
        )
            .into_response(),
        Err(e) => {
            error!("Health check error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    pub region: Option<String>,
}

async fn trigger_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    // an empty body targets this node's region
    let request: TriggerRequest = if body.is_empty() {
        TriggerRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "status": "error", "error": e.to_string() })),
                )
                    .into_response()
            }
        }
    };

    match state.simulator.trigger_manual(request.region.as_deref()).await {
        Ok(_) => {
            let region = request.region.unwrap_or_else(|| state.region.clone());
            (StatusCode::OK, Json(json!({ "status": "triggered", "region": region }))).into_response()
        }
        Err(e) => {
            error!("Manual trigger error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub agent_id: String,
    pub detection_id: String,
    pub feedback_type: String,
}

async fn feedback_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeedbackRequest>,
) -> Response {
    let feedback_type: FeedbackType = match request.feedback_type.parse() {
        Ok(kind) => kind,
        Err(e) => {
            warn!("Rejected feedback: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "error": e })),
            )
                .into_response();
        }
    };

    let agent = AgentId::new(request.agent_id);
    let feedback = Feedback::new(request.detection_id, feedback_type);
    match state.feedback.publish(&agent, feedback).await {
        Ok(delivered) => (
            StatusCode::OK,
            Json(json!({ "status": "feedback_sent", "delivered": delivered })),
        )
            .into_response(),
        Err(e) => {
            error!("Feedback error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    // lagged receivers skip ahead, the dashboard is best-effort
    let events = BroadcastStream::new(state.bus.subscribe().into_inner()).filter_map(|message| async move {
        let event = message.ok()?;
        SseEvent::default()
            .event(event.name())
            .json_data(&event)
            .ok()
            .map(Ok)
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
