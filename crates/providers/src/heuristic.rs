//! Deterministic, offline reasoning.
//!
//! Works from the structured `inputs` of each prompt, never the prose:
//! keyword-scored intent classification, routing that follows the baseline
//! and widens on retry, term-coverage evaluation, and extractive answers
//! that cite the evidence they quote. It never proposes a learned insight.

use async_trait::async_trait;
use knoroute_core::contract::*;
use knoroute_core::error::ReasoningError;
use knoroute_core::query::{Complexity, Intent};
use knoroute_core::reasoning::{PromptSpec, ReasoningService, ReasoningTask, StructuredValue};
use knoroute_core::routing::Strategy;
use knoroute_core::source::{SourceCategory, SourceSet};
use knoroute_core::text::terms;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;

const DEBUGGING_KEYWORDS: &[&str] = &[
    "error", "fail", "failing", "bug", "crash", "exception", "timeout", "broken", "not working",
    "fix", "issue", "panic", "stack trace", "500", "401", "403", "why is",
];
const COMPARISON_KEYWORDS: &[&str] = &[
    " vs ", " vs.", "versus", "compare", "comparison", "difference between", "better than",
    "pros and cons", "which is better",
];
const HOW_TO_KEYWORDS: &[&str] = &[
    "how do i", "how to", "how can i", "how should i", "steps to", "set up", "setup",
    "configure", "install", "enable", "implement",
];
const MEMORY_KEYWORDS: &[&str] = &[
    "before", "previous", "previously", "again", "history", "pattern", "best practice",
    "lesson", "usually", "recurring", "past", "last time", "similar",
];

const SUFFICIENT_COVERAGE: f32 = 0.6;
const ANSWER_CITATIONS: usize = 3;

#[derive(Debug, Default)]
pub struct HeuristicReasoner;

impl HeuristicReasoner {
    pub fn new() -> Self {
        Self
    }

    fn understand(&self, input: UnderstandInput) -> UnderstandOutput {
        let lower = format!(" {} ", input.query.to_lowercase());
        let hits = |keywords: &[&str]| keywords.iter().filter(|k| lower.contains(*k)).count();

        // Most specific first; a later intent must score strictly higher to win.
        let mut intent = Intent::Explanation;
        let mut best = 0;
        for (candidate, keywords) in [
            (Intent::Comparison, COMPARISON_KEYWORDS),
            (Intent::Debugging, DEBUGGING_KEYWORDS),
            (Intent::HowTo, HOW_TO_KEYWORDS),
        ] {
            let score = hits(keywords);
            if score > best {
                best = score;
                intent = candidate;
            }
        }

        let words = input.query.split_whitespace().count();
        let clauses = lower.matches(" and ").count() + lower.matches(',').count();
        let complexity = if words > 25 || clauses >= 2 {
            Complexity::Complex
        } else if words > 8 || clauses == 1 {
            Complexity::Moderate
        } else {
            Complexity::Simple
        };

        let key_terms = terms(&input.query);
        let topic = if key_terms.is_empty() {
            input.query.trim().to_string()
        } else {
            key_terms.into_iter().take(6).collect::<Vec<_>>().join(" ")
        };

        UnderstandOutput {
            intent,
            topic,
            needs_memory: hits(MEMORY_KEYWORDS) > 0,
            complexity,
        }
    }

    fn route(&self, input: RouteInput) -> RouteOutput {
        if !input.is_retry() {
            let sources = input.baseline.clone();
            return RouteOutput {
                strategy: if sources.len() > 1 { Strategy::Parallel } else { Strategy::Sequential },
                reasoning: format!("{} query: consulting the baseline sources.", input.intent),
                selected_sources: sources,
                retry_allowed: true,
            };
        }

        let previous: SourceSet = input.previous_sources.iter().copied().collect();
        let mut selected = previous.clone();
        selected.extend(input.suggested_sources.iter().copied());
        if selected == previous {
            if let Some(next) = SourceCategory::ALL.into_iter().find(|c| !previous.contains(c)) {
                selected.insert(next);
            }
        }
        let widened = selected.len() > previous.len();

        RouteOutput {
            selected_sources: selected.into_iter().collect(),
            strategy: Strategy::Parallel,
            retry_allowed: widened,
            reasoning: if widened {
                format!("Retry: widening to cover {}.", input.missing_aspects.join("; "))
            } else {
                "Retry: every source already consulted.".to_string()
            },
        }
    }

    fn evaluate(&self, input: EvaluateInput) -> EvaluateOutput {
        let query_terms: Vec<String> = dedup(terms(&input.query));
        let evidence_terms: HashSet<String> = input
            .evidence
            .iter()
            .flat_map(|e| terms(&e.content))
            .collect();

        let uncovered: Vec<&String> = query_terms.iter().filter(|t| !evidence_terms.contains(*t)).collect();
        let coverage = if query_terms.is_empty() {
            if input.evidence.is_empty() { 0.0 } else { 1.0 }
        } else {
            (query_terms.len() - uncovered.len()) as f32 / query_terms.len() as f32
        };

        let volume = (input.evidence.len().min(4) as f32) * 0.05;
        let confidence = if input.evidence.is_empty() {
            0.0
        } else {
            (0.2 + 0.6 * coverage + volume).min(1.0)
        };
        let is_sufficient = input.evidence.len() >= 2 && coverage >= SUFFICIENT_COVERAGE;

        let missing_aspects = if is_sufficient {
            Vec::new()
        } else if uncovered.is_empty() {
            vec!["more corroborating evidence".to_string()]
        } else {
            uncovered.iter().map(|t| format!("information about '{t}'")).collect()
        };

        let queried: SourceSet = input.sources_queried.iter().copied().collect();
        let suggested_sources = if is_sufficient {
            Vec::new()
        } else {
            SourceCategory::ALL
                .into_iter()
                .filter(|c| !queried.contains(c))
                .take(2)
                .collect()
        };

        EvaluateOutput {
            is_sufficient,
            confidence,
            missing_aspects,
            suggested_sources,
        }
    }

    fn answer(&self, input: AnswerInput) -> AnswerOutput {
        if input.evidence.is_empty() {
            return AnswerOutput {
                answer: format!(
                    "The knowledge base does not contain enough information to answer \"{}\".",
                    input.query
                ),
                confidence: 0.1,
                citations: Vec::new(),
                insight: None,
            };
        }

        let query_terms: HashSet<String> = terms(&input.query).into_iter().collect();
        let mut ranked: Vec<(usize, &EvidenceView)> = input
            .evidence
            .iter()
            .map(|e| {
                let overlap = terms(&e.content)
                    .into_iter()
                    .collect::<HashSet<_>>()
                    .intersection(&query_terms)
                    .count();
                (overlap, e)
            })
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.index.cmp(&b.1.index)));

        let chosen: Vec<&EvidenceView> = ranked
            .into_iter()
            .take(ANSWER_CITATIONS)
            .map(|(_, e)| e)
            .collect();

        let mut answer = String::from("Based on the retrieved evidence:\n");
        for e in &chosen {
            let snippet: String = e.content.chars().take(240).collect();
            answer.push_str(&format!("- [{}] {}\n", e.index, snippet.trim()));
        }

        AnswerOutput {
            answer: answer.trim_end().to_string(),
            confidence: (0.4 + 0.15 * chosen.len() as f32).min(0.9),
            citations: chosen
                .iter()
                .map(|e| CitedEvidence {
                    evidence: e.index,
                    relevance: format!("{} evidence quoted in the answer", e.source),
                })
                .collect(),
            insight: None,
        }
    }
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

fn parse<T: DeserializeOwned>(prompt: &PromptSpec) -> Result<T, ReasoningError> {
    serde_json::from_value(prompt.inputs.clone())
        .map_err(|e| ReasoningError::invalid(prompt.task, format!("unusable inputs: {e}")))
}

fn emit<T: Serialize>(task: ReasoningTask, output: T) -> Result<StructuredValue, ReasoningError> {
    serde_json::to_value(output).map_err(|e| ReasoningError::invalid(task, e.to_string()))
}

#[async_trait]
impl ReasoningService for HeuristicReasoner {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn complete(&self, prompt: PromptSpec) -> Result<StructuredValue, ReasoningError> {
        match prompt.task {
            ReasoningTask::Understand => emit(prompt.task, self.understand(parse(&prompt)?)),
            ReasoningTask::Route => emit(prompt.task, self.route(parse(&prompt)?)),
            ReasoningTask::Evaluate => emit(prompt.task, self.evaluate(parse(&prompt)?)),
            ReasoningTask::Answer => emit(prompt.task, self.answer(parse(&prompt)?)),
        }
    }
}
