//! `/v1` API: queries, insights, store stats, and the event stream.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Json, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::StreamExt;
use knoroute_agent::{FeedbackOutcome, InsightRecord, QueryRequest};
use knoroute_config::MAX_RETRIES_LIMIT;
use knoroute_core::answer::Citation;
use knoroute_core::error::{Error, ValidationError};
use knoroute_core::source::SourceCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use tracing::{info, warn};

use crate::SharedState;

pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/query", post(query_handler))
        .route("/insights", post(insight_handler))
        .route("/stats", get(stats_handler))
        .route("/events", get(event_stream_handler))
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// A workflow error on its way out as an HTTP response.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            Error::Reasoning(_) => (StatusCode::BAD_GATEWAY, "reasoning"),
            Error::Retrieval(_) => (StatusCode::SERVICE_UNAVAILABLE, "retrieval"),
            Error::Cancelled { .. } => (StatusCode::GATEWAY_TIMEOUT, "cancelled"),
            Error::DeadlineExceeded { .. } => (StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded"),
            Error::Config { .. } | Error::Serialization(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self.0, "Request failed");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: kind.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ── Query ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub query: String,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    pub confidence: f32,
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight: Option<String>,
    pub retry_count: u32,
    pub rounds: u32,
}

async fn query_handler(
    State(state): State<SharedState>,
    Json(body): Json<QueryBody>,
) -> Result<Json<QueryResponse>, ApiError> {
    if let Some(requested) = body.max_retries.filter(|n| *n > MAX_RETRIES_LIMIT) {
        return Err(Error::from(ValidationError::MaxRetriesOutOfRange {
            requested,
            limit: MAX_RETRIES_LIMIT,
        })
        .into());
    }

    info!(query_len = body.query.len(), max_retries = ?body.max_retries, "Query received");

    let request = QueryRequest {
        max_retries: body.max_retries,
        ..QueryRequest::new(body.query.clone())
    };
    let outcome = state.router.run(request).await?;

    Ok(Json(QueryResponse {
        query: body.query.trim().to_string(),
        answer: outcome.answer.text,
        confidence: outcome.answer.confidence.value(),
        citations: outcome.answer.citations,
        insight: outcome.answer.insight,
        retry_count: outcome.retry_count,
        rounds: outcome.rounds,
    }))
}

// ── Insights ──────────────────────────────────────────────────────────────

async fn insight_handler(
    State(state): State<SharedState>,
    Json(record): Json<InsightRecord>,
) -> Result<(StatusCode, Json<FeedbackOutcome>), ApiError> {
    let outcome = state.router.insights().write_insight(&record).await?;
    let status = match outcome {
        FeedbackOutcome::Stored { .. } => StatusCode::CREATED,
        FeedbackOutcome::Skipped => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

// ── Stats ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub reasoner: String,
    pub documents: BTreeMap<SourceCategory, usize>,
}

async fn stats_handler(State(state): State<SharedState>) -> Result<Json<StatsResponse>, ApiError> {
    let documents = state.router.knowledge().stats().await.map_err(Error::from)?;
    Ok(Json(StatsResponse {
        reasoner: state.router.reasoner_name().to_string(),
        documents,
    }))
}

// ── SSE event stream ──────────────────────────────────────────────────────

/// `GET /v1/events`: pipeline events as they happen. Lagged events are dropped.
async fn event_stream_handler(
    State(state): State<SharedState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.event_bus.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx)
        .filter_map(|result| async move { result.ok() })
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok(SseEvent::default().event(event.kind()).data(data))
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
