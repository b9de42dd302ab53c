//! Pipeline event system: decoupled observation of query processing.
//!
//! Events are published as a query moves through the retrieval loop.
//! Other components (gateway event stream, logs, tests) can subscribe
//! without the workflow knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::source::SourceCategory;

/// All pipeline events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A query was accepted
    QueryStarted {
        query_id: String,
        query: String,
        max_retries: u32,
        timestamp: DateTime<Utc>,
    },

    /// The workflow moved to a new phase
    PhaseEntered {
        query_id: String,
        phase: String,
        timestamp: DateTime<Utc>,
    },

    /// A retrieval round finished and was merged into the pool
    RoundCompleted {
        query_id: String,
        round: u32,
        sources: Vec<SourceCategory>,
        fetched: usize,
        admitted: usize,
        pool_size: usize,
        timestamp: DateTime<Utc>,
    },

    /// The evaluator judged the pool
    EvaluationCompleted {
        query_id: String,
        round: u32,
        is_sufficient: bool,
        confidence: f32,
        missing_aspects: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// The controller sent the query back to routing
    RetryScheduled {
        query_id: String,
        retry_count: u32,
        max_retries: u32,
        timestamp: DateTime<Utc>,
    },

    /// A grounded answer was produced
    AnswerProduced {
        query_id: String,
        confidence: f32,
        citations: usize,
        rounds: u32,
        timestamp: DateTime<Utc>,
    },

    /// A learned insight was written to the memory store
    InsightStored {
        query_id: String,
        memory_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A learned insight already existed and was not written
    InsightSkipped {
        query_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The query aborted
    QueryFailed {
        query_id: String,
        phase: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// The serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueryStarted { .. } => "query_started",
            Self::PhaseEntered { .. } => "phase_entered",
            Self::RoundCompleted { .. } => "round_completed",
            Self::EvaluationCompleted { .. } => "evaluation_completed",
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::AnswerProduced { .. } => "answer_produced",
            Self::InsightStored { .. } => "insight_stored",
            Self::InsightSkipped { .. } => "insight_skipped",
            Self::QueryFailed { .. } => "query_failed",
        }
    }

    pub fn query_id(&self) -> &str {
        match self {
            Self::QueryStarted { query_id, .. }
            | Self::PhaseEntered { query_id, .. }
            | Self::RoundCompleted { query_id, .. }
            | Self::EvaluationCompleted { query_id, .. }
            | Self::RetryScheduled { query_id, .. }
            | Self::AnswerProduced { query_id, .. }
            | Self::InsightStored { query_id, .. }
            | Self::InsightSkipped { query_id, .. }
            | Self::QueryFailed { query_id, .. } => query_id,
        }
    }
}

/// A broadcast-based event bus for pipeline events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<PipelineEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PipelineEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
