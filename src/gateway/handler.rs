//! HTTP API handler
//!
//! Admin endpoints:
//! - GET    /health
//! - GET    /api/v1/updates/pending
//! - GET    /api/v1/updates/:id
//! - GET    /api/v1/memory-candidates/pending
//! - GET    /api/v1/memories?q=&limit=
//! - DELETE /api/v1/memories/:id
//! - POST   /api/v1/knowledge/reload
//!
//! Slack webhooks (signature-verified, then queued as channel events):
//! - POST   /slack/events
//! - POST   /slack/interactions

use crate::channels::SlackAdapter;
use crate::error::Error;
use crate::gateway::Gateway;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const DEFAULT_MEMORY_LIMIT: usize = 50;
const MAX_MEMORY_LIMIT: usize = 500;

/// Create the router
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/updates/pending", get(list_pending_updates))
        .route("/api/v1/updates/:id", get(get_update))
        .route(
            "/api/v1/memory-candidates/pending",
            get(list_pending_candidates),
        )
        .route("/api/v1/memories", get(list_memories))
        .route("/api/v1/memories/:id", delete(delete_memory))
        .route("/api/v1/knowledge/reload", post(reload_knowledge))
        .route("/slack/events", post(slack_events))
        .route("/slack/interactions", post(slack_interactions))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

// =============================================================================
// Errors
// =============================================================================

/// API error body
#[derive(Debug, Serialize)]
struct ApiErrorDetail {
    code: String,
    message: String,
}

/// API error with its HTTP status
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: ApiErrorDetail,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            detail: ApiErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        tracing::error!("API request failed: {}", e);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            e.to_string(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.detail }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// =============================================================================
// Admin endpoints
// =============================================================================

/// GET /health
async fn health_check(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    let status = gateway.status().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "gateway": status,
    }))
}

/// GET /api/v1/updates/pending
async fn list_pending_updates(State(gateway): State<Arc<Gateway>>) -> ApiResult<Response> {
    let updates = gateway.records().list_pending_updates().await?;
    Ok(Json(updates).into_response())
}

/// GET /api/v1/updates/:id
async fn get_update(
    State(gateway): State<Arc<Gateway>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    match gateway.records().get_update(&id).await? {
        Some(update) => Ok(Json(update).into_response()),
        None => Err(ApiError::not_found(format!("Update {} not found", id))),
    }
}

/// GET /api/v1/memory-candidates/pending
async fn list_pending_candidates(State(gateway): State<Arc<Gateway>>) -> ApiResult<Response> {
    let candidates = gateway.records().list_pending_memory_candidates().await?;
    Ok(Json(candidates).into_response())
}

#[derive(Debug, Deserialize)]
struct MemoryQuery {
    q: Option<String>,
    limit: Option<usize>,
}

/// GET /api/v1/memories?q=&limit=
async fn list_memories(
    State(gateway): State<Arc<Gateway>>,
    Query(query): Query<MemoryQuery>,
) -> ApiResult<Response> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MEMORY_LIMIT)
        .clamp(1, MAX_MEMORY_LIMIT);
    let memories = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => gateway.records().search_memories(q, limit).await?,
        _ => gateway.records().list_memories(limit).await?,
    };
    Ok(Json(memories).into_response())
}

/// DELETE /api/v1/memories/:id
async fn delete_memory(
    State(gateway): State<Arc<Gateway>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if gateway.records().delete_memory(&id).await? {
        tracing::info!("Memory {} deleted via API", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Memory {} not found", id)))
    }
}

/// POST /api/v1/knowledge/reload
async fn reload_knowledge(State(gateway): State<Arc<Gateway>>) -> ApiResult<Response> {
    let version = gateway.knowledge().reload().await?;
    Ok(Json(json!({ "version": version })).into_response())
}

// =============================================================================
// Slack webhooks
// =============================================================================

/// Check the Slack signature headers against the raw body
fn verify_slack<'a>(
    gateway: &'a Gateway,
    headers: &HeaderMap,
    body: &str,
) -> ApiResult<&'a SlackAdapter> {
    let slack = gateway
        .slack()
        .ok_or_else(|| ApiError::not_found("Slack is not configured"))?;

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    };
    let timestamp = header("x-slack-request-timestamp");
    let signature = header("x-slack-signature");

    if !slack.verify_request(timestamp, body, signature, chrono::Utc::now().timestamp()) {
        tracing::warn!("Rejected Slack request with invalid signature");
        return Err(ApiError::unauthorized("Invalid Slack signature"));
    }
    Ok(slack)
}

/// POST /slack/events
async fn slack_events(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Response> {
    let slack = verify_slack(&gateway, &headers, &body)?;
    let payload: Value = serde_json::from_str(&body)
        .map_err(|e| ApiError::bad_request(format!("Malformed event body: {}", e)))?;

    if payload["type"] == "url_verification" {
        return Ok(Json(json!({ "challenge": payload["challenge"] })).into_response());
    }

    // Slack retries when the first delivery was slow; the original is
    // already queued.
    if headers.contains_key("x-slack-retry-num") {
        tracing::debug!("Ignoring Slack event retry");
        return Ok(StatusCode::OK.into_response());
    }

    if let Some(event) = slack.parse_event_callback(&payload) {
        queue_event(&gateway, event).await;
    }
    Ok(StatusCode::OK.into_response())
}

/// POST /slack/interactions
async fn slack_interactions(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<StatusCode> {
    let slack = verify_slack(&gateway, &headers, &body)?;
    if let Some(event) = slack.parse_interaction_body(&body) {
        queue_event(&gateway, event).await;
    }
    // An empty 200 closes a submitted modal
    Ok(StatusCode::OK)
}

async fn queue_event(gateway: &Gateway, event: crate::channels::ChannelEvent) {
    if let Err(e) = gateway.event_sender().send(event).await {
        tracing::error!("Failed to queue channel event: {}", e);
    }
}
