// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Store server HTTP surface.
//!
//! Exposes one [`InMemoryStore`] to agents in other processes. Each handler is
//! a single store call, so conditional lease writes stay atomic server-side.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::domain::agent::AgentId;
use crate::domain::event::{Cursor, ReadBatch};
use crate::domain::feedback::Feedback;
use crate::domain::store::{
    FeedbackBus, LeaseStore, SensorRegistry, StoreError, StoreHealth, StoreStats, StreamStore,
};
use crate::infrastructure::in_memory_store::InMemoryStore;
use crate::infrastructure::store_protocol::{
    AppendRequest, AppendResponse, CountResponse, ErrorResponse, LeaseRequest, LeaseResponse,
    PublishResponse, ReadQuery, RegisterRequest, TrimRequest, TrimResponse,
};

/// Upper bound on how long one read may hold a connection.
const MAX_BLOCK: Duration = Duration::from_secs(60);

pub fn router(store: InMemoryStore) -> Router {
    Router::new()
        .route("/streams/{key}/entries", post(append_handler).get(read_handler))
        .route("/streams/{key}/trim", post(trim_handler))
        .route("/leases/{key}/acquire", post(acquire_handler))
        .route("/leases/{key}/extend", post(extend_handler))
        .route("/leases/{key}/release", post(release_handler))
        .route("/registry/{region}/sensors", post(register_handler))
        .route("/registry/{region}/sensors/count", get(count_handler))
        .route("/feedback/{agent_id}", post(publish_handler))
        .route("/feedback/{agent_id}/subscribe", get(subscribe_handler))
        .route("/stats", get(stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Maps store errors onto HTTP statuses.
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            StoreError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

async fn append_handler(
    State(store): State<InMemoryStore>,
    Path(key): Path<String>,
    Json(request): Json<AppendRequest>,
) -> Result<Json<AppendResponse>, ApiError> {
    let id = store.append(&key, request.fields).await?;
    Ok(Json(AppendResponse { id }))
}

async fn read_handler(
    State(store): State<InMemoryStore>,
    Path(key): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<ReadBatch>, ApiError> {
    let cursor: Cursor = query
        .cursor
        .parse()
        .map_err(|e| StoreError::InvalidRequest(format!("{}", e)))?;
    let block = Duration::from_millis(query.block_ms).min(MAX_BLOCK);
    let batch = store.read(&key, cursor, query.count, block).await?;
    Ok(Json(batch))
}

async fn trim_handler(
    State(store): State<InMemoryStore>,
    Path(key): Path<String>,
    Json(request): Json<TrimRequest>,
) -> Result<Json<TrimResponse>, ApiError> {
    let removed = store.trim(&key, request.max_len, request.limit).await?;
    Ok(Json(TrimResponse { removed }))
}

fn required_ttl(request: &LeaseRequest) -> Result<Duration, ApiError> {
    match request.ttl_ms {
        Some(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(StoreError::InvalidRequest("ttl_ms must be a positive integer".to_string()).into()),
    }
}

async fn acquire_handler(
    State(store): State<InMemoryStore>,
    Path(key): Path<String>,
    Json(request): Json<LeaseRequest>,
) -> Result<Json<LeaseResponse>, ApiError> {
    let ttl = required_ttl(&request)?;
    let ok = store.try_acquire(&key, &request.owner, ttl).await?;
    Ok(Json(LeaseResponse { ok }))
}

async fn extend_handler(
    State(store): State<InMemoryStore>,
    Path(key): Path<String>,
    Json(request): Json<LeaseRequest>,
) -> Result<Json<LeaseResponse>, ApiError> {
    let ttl = required_ttl(&request)?;
    let ok = store.extend_if_owner(&key, &request.owner, ttl).await?;
    Ok(Json(LeaseResponse { ok }))
}

async fn release_handler(
    State(store): State<InMemoryStore>,
    Path(key): Path<String>,
    Json(request): Json<LeaseRequest>,
) -> Result<Json<LeaseResponse>, ApiError> {
    let ok = store.release_if_owner(&key, &request.owner).await?;
    Ok(Json(LeaseResponse { ok }))
}

async fn register_handler(
    State(store): State<InMemoryStore>,
    Path(region): Path<String>,
    Json(request): Json<RegisterRequest>,
) -> Result<StatusCode, ApiError> {
    store.register(&region, &request.agent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn count_handler(
    State(store): State<InMemoryStore>,
    Path(region): Path<String>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = SensorRegistry::count(&store, &region).await?;
    Ok(Json(CountResponse { count }))
}

async fn publish_handler(
    State(store): State<InMemoryStore>,
    Path(agent_id): Path<String>,
    Json(feedback): Json<Feedback>,
) -> Result<Json<PublishResponse>, ApiError> {
    let delivered = store.publish(&AgentId::new(agent_id), feedback).await?;
    Ok(Json(PublishResponse { delivered }))
}

async fn subscribe_handler(
    State(store): State<InMemoryStore>,
    Path(agent_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let feedback = store.subscribe(&AgentId::new(agent_id)).await?;
    let events = feedback.filter_map(|message| async move {
        SseEvent::default().json_data(&message).ok().map(Ok)
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn stats_handler(State(store): State<InMemoryStore>) -> Result<Json<StoreStats>, ApiError> {
    Ok(Json(store.stats().await?))
}
