//! Answer synthesizer: a grounded answer with citations into the pool.

use knoroute_core::answer::{Answer, Citation};
use knoroute_core::confidence::Confidence;
use knoroute_core::contract::{AnswerInput, AnswerOutput, EvidenceView};
use knoroute_core::error::ReasoningError;
use knoroute_core::evaluation::EvaluationResult;
use knoroute_core::evidence::EvidencePool;
use knoroute_core::query::Query;
use knoroute_core::reasoning::{PromptSpec, ReasoningService, ReasoningTask};
use std::collections::HashSet;
use std::fmt::Write;
use tracing::{info, warn};

use crate::prompt::{ask, with_inputs};

pub const MIN_INSIGHT_CHARS: usize = 12;
pub const MAX_INSIGHT_CHARS: usize = 280;

const SYSTEM: &str = "\
You answer engineering questions using only the numbered evidence provided.

Cite every piece of evidence you rely on by its number and say briefly why it is relevant.
If the evidence does not cover the question, say so plainly instead of guessing.

Optionally return one insight: a short, reusable lesson (a pattern, root cause or best
practice) worth remembering for future questions. Leave it null when there is nothing
new to learn.";

/// Produce the final answer from everything retrieved.
///
/// The answer's confidence never exceeds the evaluation's, and every
/// citation resolves to an item of `pool`.
pub async fn synthesize(
    reasoner: &dyn ReasoningService,
    query: &Query,
    pool: &EvidencePool,
    evaluation: &EvaluationResult,
) -> Result<Answer, ReasoningError> {
    let evidence = EvidenceView::number(pool.iter(), None);
    let prompt = PromptSpec::new(ReasoningTask::Answer, SYSTEM, user_text(query, &evidence))
        .with_output_schema(AnswerOutput::schema());
    let prompt = with_inputs(
        prompt,
        &AnswerInput {
            query: query.to_string(),
            evidence,
        },
    )?;

    let out: AnswerOutput = ask(reasoner, prompt).await?;
    let stated = Confidence::new(out.confidence)
        .map_err(|e| ReasoningError::invalid(ReasoningTask::Answer, e.to_string()))?;
    if out.answer.trim().is_empty() {
        return Err(ReasoningError::invalid(ReasoningTask::Answer, "empty answer"));
    }

    let mut seen = HashSet::new();
    let mut citations = Vec::new();
    for cited in out.citations {
        let Some(item) = pool.cited(cited.evidence) else {
            warn!(evidence = cited.evidence, pool_size = pool.len(), "Dropping citation outside the evidence pool");
            continue;
        };
        if !seen.insert(cited.evidence) {
            continue;
        }
        citations.push(Citation {
            source: item.source,
            fingerprint: item.fingerprint.clone(),
            document_id: item.document_id.clone(),
            locator: item.metadata.locator().to_string(),
            relevance: cited.relevance,
        });
    }

    let answer = Answer {
        text: out.answer.trim().to_string(),
        confidence: stated.min(evaluation.confidence()),
        citations,
        insight: filter_insight(out.insight.as_deref(), query),
    };

    info!(
        confidence = %answer.confidence,
        citations = answer.citations.len(),
        insight = answer.insight.is_some(),
        "Answer synthesized"
    );
    Ok(answer)
}

/// Keep an insight only if it is a plausible standalone lesson.
pub fn filter_insight(insight: Option<&str>, query: &Query) -> Option<String> {
    let insight = insight?.trim();
    let chars = insight.chars().count();
    if !(MIN_INSIGHT_CHARS..=MAX_INSIGHT_CHARS).contains(&chars) {
        return None;
    }
    if insight.eq_ignore_ascii_case(query.as_str()) {
        return None;
    }
    Some(insight.to_string())
}

fn user_text(query: &Query, evidence: &[EvidenceView]) -> String {
    let mut text = format!("Query: {query}\n\nEvidence:\n");
    if evidence.is_empty() {
        text.push_str("(none retrieved)\n");
    }
    for view in evidence {
        let _ = writeln!(text, "[{}] ({}) {}", view.index, view.source, view.labels.join(" | "));
        let _ = writeln!(text, "{}\n", view.content);
    }
    text.push_str("Answer the query, citing evidence by number.");
    text
}
