//! The adaptive retrieval loop.
//!
//! ```text
//! Understanding -> Routing -> Retrieving -> Merging -> Evaluating
//!                     ^                                    |
//!                     +------------- retry ----------------+
//!                                                          v
//!                                  Done <- WritingFeedback <- Answering
//! ```
//!
//! One [`QueryState`] is created per query and threaded through every
//! phase. The only backward edge is the retry from `Evaluating` to
//! `Routing`, bounded by the retry budget, so a query runs at most
//! `max_retries + 1` retrieval rounds. Cancellation and the deadline are
//! checked each time the loop enters a phase.

use chrono::Utc;
use knoroute_config::MAX_RETRIES_LIMIT;
use knoroute_core::answer::Answer;
use knoroute_core::error::{Error, Result};
use knoroute_core::evaluation::EvaluationResult;
use knoroute_core::event::{EventBus, PipelineEvent};
use knoroute_core::evidence::EvidencePool;
use knoroute_core::query::Query;
use knoroute_core::reasoning::ReasoningService;
use knoroute_core::routing::RoutingDecision;
use knoroute_core::source::{SourceSet, format_sources};
use knoroute_core::store::KnowledgeBase;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::answer::synthesize;
use crate::evaluation::evaluate;
use crate::feedback::{FeedbackOutcome, InsightRecord, InsightWriter};
use crate::retrieval::{FetchOptions, fetch_round};
use crate::routing::plan;
use crate::settings::WorkflowSettings;
use crate::state::{FinalizeReason, Phase, QueryState, Transition, next_after_evaluation};
use crate::understanding::understand;

/// A query submission.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub query: String,
    /// Overrides the configured retry budget; clamped to `0..=5`
    pub max_retries: Option<u32>,
    /// Overrides the configured deadline
    pub deadline: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Everything a finished query produced.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub query_id: String,
    pub answer: Answer,
    pub retry_count: u32,
    pub rounds: u32,
    pub sources_queried: SourceSet,
    pub evaluation: EvaluationResult,
    pub finalize_reason: FinalizeReason,
    /// One plan per round
    pub decisions: Vec<RoutingDecision>,
    pub pool: EvidencePool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackOutcome>,
}

/// The workflow entry point. Immutable once built; share it behind an `Arc`.
pub struct KnowledgeRouter {
    knowledge: KnowledgeBase,
    reasoner: Arc<dyn ReasoningService>,
    settings: WorkflowSettings,
    insights: InsightWriter,
    event_bus: Option<Arc<EventBus>>,
}

impl KnowledgeRouter {
    pub fn new(knowledge: KnowledgeBase, reasoner: Arc<dyn ReasoningService>, settings: WorkflowSettings) -> Self {
        let insights = InsightWriter::new(knowledge.memory().clone());
        Self {
            knowledge,
            reasoner,
            settings,
            insights,
            event_bus: None,
        }
    }

    /// Publish pipeline events to `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn insights(&self) -> &InsightWriter {
        &self.insights
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn reasoner_name(&self) -> &str {
        self.reasoner.name()
    }

    /// Answer `text`, optionally overriding the retry budget.
    pub async fn query(&self, text: &str, max_retries: Option<u32>) -> Result<Answer> {
        let request = QueryRequest {
            max_retries,
            ..QueryRequest::new(text)
        };
        Ok(self.run(request).await?.answer)
    }

    /// Run the full loop for one request.
    pub async fn run(&self, request: QueryRequest) -> Result<QueryOutcome> {
        let query = Query::new(request.query)?;
        let requested = request.max_retries.unwrap_or(self.settings.max_retries);
        if requested > MAX_RETRIES_LIMIT {
            warn!(requested, limit = MAX_RETRIES_LIMIT, "Clamping retry budget");
        }

        let mut state = QueryState::new(uuid::Uuid::new_v4().to_string(), query, requested);
        let cancel = request.cancel.unwrap_or_default();
        let deadline = request.deadline.or(self.settings.deadline).map(|d| Instant::now() + d);

        info!(
            query_id = %state.query_id,
            max_retries = state.attempt.max_retries(),
            reasoner = %self.reasoner.name(),
            "Processing query"
        );
        self.emit(PipelineEvent::QueryStarted {
            query_id: state.query_id.clone(),
            query: state.query.to_string(),
            max_retries: state.attempt.max_retries(),
            timestamp: Utc::now(),
        });

        match self.drive(&mut state, &cancel, deadline).await {
            Ok(()) => into_outcome(state),
            Err(e) => {
                warn!(query_id = %state.query_id, phase = %state.phase, error = %e, "Query failed");
                self.emit(PipelineEvent::QueryFailed {
                    query_id: state.query_id.clone(),
                    phase: state.phase.to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn drive(&self, state: &mut QueryState, cancel: &CancellationToken, deadline: Option<Instant>) -> Result<()> {
        let reasoner = self.reasoner.as_ref();

        loop {
            if state.phase == Phase::Done {
                return Ok(());
            }
            check_boundary(state.phase, cancel, deadline)?;
            self.emit(PipelineEvent::PhaseEntered {
                query_id: state.query_id.clone(),
                phase: state.phase.to_string(),
                timestamp: Utc::now(),
            });

            state.phase = match state.phase {
                Phase::Understanding => {
                    state.understanding = Some(understand(reasoner, &state.query).await?);
                    Phase::Routing
                }

                Phase::Routing => {
                    let understanding = state.understanding.as_ref().ok_or_else(|| missing("understanding"))?;
                    let retry = state.attempt.retry_context();
                    let decision = plan(reasoner, &state.query, understanding, retry.as_ref()).await?;
                    state.decisions.push(decision.clone());
                    state.decision = Some(decision);
                    Phase::Retrieving
                }

                Phase::Retrieving => {
                    let decision = state.decision.as_ref().ok_or_else(|| missing("routing decision"))?;
                    state.batch = fetch_round(&self.knowledge, &state.query, decision, self.fetch_options()).await?;
                    Phase::Merging
                }

                Phase::Merging => {
                    let decision = state.decision.as_ref().ok_or_else(|| missing("routing decision"))?;
                    let stats = state.pool.merge(std::mem::take(&mut state.batch));
                    state.attempt.record_round(decision.selected_sources());

                    info!(
                        round = state.attempt.rounds(),
                        sources = %format_sources(decision.selected_sources()),
                        fetched = stats.fetched,
                        admitted = stats.admitted,
                        duplicates = stats.duplicates,
                        pool_size = state.pool.len(),
                        "Retrieval round merged"
                    );
                    self.emit(PipelineEvent::RoundCompleted {
                        query_id: state.query_id.clone(),
                        round: state.attempt.rounds(),
                        sources: decision.selected_sources().iter().copied().collect(),
                        fetched: stats.fetched,
                        admitted: stats.admitted,
                        pool_size: state.pool.len(),
                        timestamp: Utc::now(),
                    });
                    Phase::Evaluating
                }

                Phase::Evaluating => {
                    let evaluation =
                        evaluate(reasoner, &state.query, &state.pool, state.attempt.sources_queried()).await?;
                    state.attempt.record_evaluation(&evaluation);
                    self.emit(PipelineEvent::EvaluationCompleted {
                        query_id: state.query_id.clone(),
                        round: state.attempt.rounds(),
                        is_sufficient: evaluation.is_sufficient(),
                        confidence: evaluation.confidence().value(),
                        missing_aspects: evaluation.missing_aspects().to_vec(),
                        timestamp: Utc::now(),
                    });

                    let decision = state.decision.as_ref().ok_or_else(|| missing("routing decision"))?;
                    let transition = next_after_evaluation(&evaluation, &state.attempt, decision);
                    state.evaluation = Some(evaluation);

                    match transition {
                        Transition::Retry => {
                            state.attempt.schedule_retry();
                            info!(
                                retry_count = state.attempt.retry_count(),
                                max_retries = state.attempt.max_retries(),
                                "Evidence insufficient, retrying"
                            );
                            self.emit(PipelineEvent::RetryScheduled {
                                query_id: state.query_id.clone(),
                                retry_count: state.attempt.retry_count(),
                                max_retries: state.attempt.max_retries(),
                                timestamp: Utc::now(),
                            });
                            Phase::Routing
                        }
                        Transition::Finalize(reason) => {
                            state.finalize_reason = Some(reason);
                            Phase::Answering
                        }
                    }
                }

                Phase::Answering => {
                    let evaluation = state.evaluation.as_ref().ok_or_else(|| missing("evaluation"))?;
                    let answer = synthesize(reasoner, &state.query, &state.pool, evaluation).await?;
                    self.emit(PipelineEvent::AnswerProduced {
                        query_id: state.query_id.clone(),
                        confidence: answer.confidence.value(),
                        citations: answer.citations.len(),
                        rounds: state.attempt.rounds(),
                        timestamp: Utc::now(),
                    });
                    state.answer = Some(answer);
                    Phase::WritingFeedback
                }

                Phase::WritingFeedback => {
                    state.feedback = self.write_feedback(state).await?;
                    Phase::Done
                }

                Phase::Done => Phase::Done,
            };
        }
    }

    async fn write_feedback(&self, state: &QueryState) -> Result<Option<FeedbackOutcome>> {
        let answer = state.answer.as_ref().ok_or_else(|| missing("answer"))?;
        let Some(insight) = answer.insight.as_deref() else {
            return Ok(None);
        };
        if !self.settings.feedback_enabled || answer.confidence.value() < self.settings.feedback_min_confidence {
            return Ok(None);
        }

        let mut record = InsightRecord::new(insight, state.query.as_str(), answer.confidence.value());
        if let Some(understanding) = &state.understanding {
            record = record.with_tags([understanding.intent().as_str(), understanding.topic()]);
        }

        let outcome = self.insights.write_insight(&record).await?;
        self.emit(match &outcome {
            FeedbackOutcome::Stored { id } => PipelineEvent::InsightStored {
                query_id: state.query_id.clone(),
                memory_id: id.clone(),
                timestamp: Utc::now(),
            },
            FeedbackOutcome::Skipped => PipelineEvent::InsightSkipped {
                query_id: state.query_id.clone(),
                timestamp: Utc::now(),
            },
        });
        Ok(Some(outcome))
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            top_k: self.settings.top_k,
            policy: self.settings.fingerprint,
            degrade_on_store_error: self.settings.degrade_on_store_error,
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

fn check_boundary(phase: Phase, cancel: &CancellationToken, deadline: Option<Instant>) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled { phase: phase.to_string() });
    }
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Err(Error::DeadlineExceeded { phase: phase.to_string() });
    }
    Ok(())
}

fn missing(what: &str) -> Error {
    Error::Internal(format!("workflow reached a phase without its {what}"))
}

fn into_outcome(state: QueryState) -> Result<QueryOutcome> {
    let answer = state.answer.ok_or_else(|| missing("answer"))?;
    let evaluation = state.evaluation.ok_or_else(|| missing("evaluation"))?;
    let finalize_reason = state.finalize_reason.ok_or_else(|| missing("finalize reason"))?;
    info!(
        query_id = %state.query_id,
        rounds = state.attempt.rounds(),
        retry_count = state.attempt.retry_count(),
        reason = ?finalize_reason,
        confidence = %answer.confidence,
        "Query answered"
    );
    Ok(QueryOutcome {
        query_id: state.query_id,
        answer,
        retry_count: state.attempt.retry_count(),
        rounds: state.attempt.rounds(),
        sources_queried: state.attempt.sources_queried().clone(),
        evaluation,
        finalize_reason,
        decisions: state.decisions,
        pool: state.pool,
        feedback: state.feedback,
    })
}
