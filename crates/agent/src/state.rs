//! The retry controller: workflow phases, per-query state, and the
//! decision taken after every evaluation.

use knoroute_config::MAX_RETRIES_LIMIT;
use knoroute_core::answer::Answer;
use knoroute_core::evaluation::EvaluationResult;
use knoroute_core::evidence::{EvidenceItem, EvidencePool};
use knoroute_core::query::{Query, Understanding};
use knoroute_core::routing::RoutingDecision;
use knoroute_core::source::SourceSet;
use serde::Serialize;
use std::fmt;

use crate::feedback::FeedbackOutcome;

/// Where a query is in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Understanding,
    Routing,
    Retrieving,
    Merging,
    Evaluating,
    Answering,
    WritingFeedback,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Understanding => "understanding",
            Self::Routing => "routing",
            Self::Retrieving => "retrieving",
            Self::Merging => "merging",
            Self::Evaluating => "evaluating",
            Self::Answering => "answering",
            Self::WritingFeedback => "writing_feedback",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the loop stopped retrieving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    Sufficient,
    BudgetExhausted,
    RetryDisallowed,
}

impl FinalizeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sufficient => "sufficient",
            Self::BudgetExhausted => "budget_exhausted",
            Self::RetryDisallowed => "retry_disallowed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Retry,
    Finalize(FinalizeReason),
}

/// What routing needs to know on a retry pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryContext {
    pub previous_sources: SourceSet,
    pub missing_aspects: Vec<String>,
    pub suggested_sources: SourceSet,
}

/// Retry bookkeeping for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptState {
    retry_count: u32,
    max_retries: u32,
    rounds: u32,
    previous_sources: SourceSet,
    missing_aspects: Vec<String>,
    suggested_sources: SourceSet,
    sources_queried: SourceSet,
}

impl AttemptState {
    /// `max_retries` is clamped to `0..=MAX_RETRIES_LIMIT`.
    pub fn new(max_retries: u32) -> Self {
        Self {
            retry_count: 0,
            max_retries: max_retries.min(MAX_RETRIES_LIMIT),
            rounds: 0,
            previous_sources: SourceSet::new(),
            missing_aspects: Vec::new(),
            suggested_sources: SourceSet::new(),
            sources_queried: SourceSet::new(),
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn sources_queried(&self) -> &SourceSet {
        &self.sources_queried
    }

    pub fn is_retry(&self) -> bool {
        self.retry_count > 0
    }

    /// Record a finished retrieval round over `sources`.
    pub fn record_round(&mut self, sources: &SourceSet) {
        self.rounds += 1;
        self.previous_sources = sources.clone();
        self.sources_queried.extend(sources.iter().copied());
    }

    pub fn record_evaluation(&mut self, evaluation: &EvaluationResult) {
        self.missing_aspects = evaluation.missing_aspects().to_vec();
        self.suggested_sources = evaluation.suggested_sources().clone();
    }

    pub fn schedule_retry(&mut self) {
        self.retry_count += 1;
    }

    /// The previous round's outcome, only once a retry has been scheduled.
    pub fn retry_context(&self) -> Option<RetryContext> {
        self.is_retry().then(|| RetryContext {
            previous_sources: self.previous_sources.clone(),
            missing_aspects: self.missing_aspects.clone(),
            suggested_sources: self.suggested_sources.clone(),
        })
    }
}

/// Decide what follows an evaluation.
///
/// Retry only when the evidence is insufficient, budget remains, and the
/// current round's plan allows it.
pub fn next_after_evaluation(
    evaluation: &EvaluationResult,
    attempt: &AttemptState,
    decision: &RoutingDecision,
) -> Transition {
    if evaluation.is_sufficient() {
        Transition::Finalize(FinalizeReason::Sufficient)
    } else if attempt.retry_count >= attempt.max_retries {
        Transition::Finalize(FinalizeReason::BudgetExhausted)
    } else if !decision.retry_allowed() {
        Transition::Finalize(FinalizeReason::RetryDisallowed)
    } else {
        Transition::Retry
    }
}

/// Everything one query accumulates on its way through the workflow.
#[derive(Debug)]
pub struct QueryState {
    pub query_id: String,
    pub query: Query,
    pub phase: Phase,
    pub attempt: AttemptState,
    pub understanding: Option<Understanding>,
    /// The current round's plan
    pub decision: Option<RoutingDecision>,
    /// Every round's plan, in order
    pub decisions: Vec<RoutingDecision>,
    /// Fetched but not yet merged
    pub batch: Vec<EvidenceItem>,
    pub pool: EvidencePool,
    pub evaluation: Option<EvaluationResult>,
    pub finalize_reason: Option<FinalizeReason>,
    pub answer: Option<Answer>,
    pub feedback: Option<FeedbackOutcome>,
}

impl QueryState {
    pub fn new(query_id: impl Into<String>, query: Query, max_retries: u32) -> Self {
        Self {
            query_id: query_id.into(),
            query,
            phase: Phase::Understanding,
            attempt: AttemptState::new(max_retries),
            understanding: None,
            decision: None,
            decisions: Vec::new(),
            batch: Vec::new(),
            pool: EvidencePool::new(),
            evaluation: None,
            finalize_reason: None,
            answer: None,
            feedback: None,
        }
    }
}
