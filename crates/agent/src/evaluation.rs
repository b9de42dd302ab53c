//! Sufficiency evaluator: can the pool answer the question yet?

use knoroute_core::confidence::Confidence;
use knoroute_core::contract::{EvaluateInput, EvaluateOutput, EvidenceView};
use knoroute_core::error::ReasoningError;
use knoroute_core::evaluation::EvaluationResult;
use knoroute_core::evidence::EvidencePool;
use knoroute_core::query::Query;
use knoroute_core::reasoning::{PromptSpec, ReasoningService, ReasoningTask};
use knoroute_core::source::{SourceCategory, SourceSet, format_sources};
use std::fmt::Write;
use tracing::info;

use crate::prompt::{ask, with_inputs};

/// Evidence shown to the evaluator is cut to this many characters per item.
pub const EXCERPT_CHARS: usize = 300;

const SYSTEM: &str = "\
You judge whether retrieved evidence is enough to answer an engineering question.

Confidence bands:
- 0.9 and above: excellent, the evidence answers the question completely
- 0.7 to 0.9: good, minor gaps
- 0.5 to 0.7: moderate, noticeable gaps
- below 0.5: insufficient

When the evidence is insufficient, list the missing aspects concretely and suggest
which stores (docs, code, tickets, memory) could fill them.";

/// Judge the pool against the query.
///
/// An empty pool is judged insufficient without consulting the reasoner.
pub async fn evaluate(
    reasoner: &dyn ReasoningService,
    query: &Query,
    pool: &EvidencePool,
    sources_queried: &SourceSet,
) -> Result<EvaluationResult, ReasoningError> {
    let unqueried: SourceSet = SourceCategory::ALL
        .into_iter()
        .filter(|c| !sources_queried.contains(c))
        .collect();

    if pool.is_empty() {
        info!("No evidence retrieved, skipping evaluation");
        return EvaluationResult::new(false, Confidence::ZERO, ["no evidence retrieved".to_string()], unqueried)
            .map_err(|e| ReasoningError::invalid(ReasoningTask::Evaluate, e.to_string()));
    }

    let evidence = EvidenceView::number(pool.iter(), Some(EXCERPT_CHARS));
    let prompt = PromptSpec::new(ReasoningTask::Evaluate, SYSTEM, user_text(query, &evidence, sources_queried))
        .with_output_schema(EvaluateOutput::schema());
    let prompt = with_inputs(
        prompt,
        &EvaluateInput {
            query: query.to_string(),
            evidence,
            sources_queried: sources_queried.iter().copied().collect(),
        },
    )?;

    let out: EvaluateOutput = ask(reasoner, prompt).await?;
    let invalid = |reason: String| ReasoningError::invalid(ReasoningTask::Evaluate, reason);
    let confidence = Confidence::new(out.confidence).map_err(|e| invalid(e.to_string()))?;
    let result = EvaluationResult::new(out.is_sufficient, confidence, out.missing_aspects, out.suggested_sources)
        .map_err(|e| invalid(e.to_string()))?;

    // Prefer stores that have not been searched yet.
    let fresh: SourceSet = result.suggested_sources().intersection(&unqueried).copied().collect();
    let result = if fresh.is_empty() { result } else { result.with_suggested_sources(fresh) };

    info!(
        sufficient = result.is_sufficient(),
        confidence = %result.confidence(),
        band = %result.band(),
        missing = result.missing_aspects().len(),
        "Evidence evaluated"
    );
    Ok(result)
}

fn user_text(query: &Query, evidence: &[EvidenceView], sources_queried: &SourceSet) -> String {
    let mut text = format!("Query: {query}\n\nSources queried: {}\n\nEvidence:\n", format_sources(sources_queried));
    for view in evidence {
        let _ = writeln!(text, "[{}] ({}) {}", view.index, view.source, view.content);
    }
    text.push_str("\nIs this evidence sufficient to answer the query?");
    text
}
