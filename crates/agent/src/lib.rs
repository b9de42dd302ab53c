//! The KnoRoute retrieval workflow.
//!
//! A query is classified, routed to a subset of the knowledge stores,
//! answered from what was retrieved, and optionally retried with a wider
//! plan when the evidence falls short:
//!
//! 1. **Understand** the query (intent, topic, memory need, complexity)
//! 2. **Route** it to docs, code, tickets and/or memory
//! 3. **Retrieve** from those stores and merge into a deduplicated pool
//! 4. **Evaluate** whether the pool is sufficient
//! 5. **Retry** from step 2 while it is not and budget remains
//! 6. **Answer** with citations into the pool
//! 7. **Feed back** any learned insight into the memory store
//!
//! Judgement calls go through a [`ReasoningService`](knoroute_core::ReasoningService);
//! store access goes through a [`KnowledgeBase`](knoroute_core::KnowledgeBase).

pub mod answer;
pub mod evaluation;
pub mod feedback;
mod prompt;
pub mod retrieval;
pub mod routing;
pub mod settings;
pub mod state;
pub mod understanding;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use feedback::{FeedbackOutcome, InsightRecord, InsightWriter};
pub use routing::baseline_sources;
pub use settings::WorkflowSettings;
pub use state::{AttemptState, FinalizeReason, Phase, Transition, next_after_evaluation};
pub use workflow::{KnowledgeRouter, QueryOutcome, QueryRequest};
