//! Per-task payloads exchanged with a [`ReasoningService`](crate::ReasoningService).
//!
//! `*Input` types travel in [`PromptSpec::inputs`](crate::PromptSpec);
//! `*Output` types are what each step deserializes the returned value into
//! before validating it into a domain type.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::evidence::EvidenceItem;
use crate::query::{Complexity, Intent};
use crate::routing::Strategy;
use crate::source::SourceCategory;

/// One evidence item as shown to a reasoner, numbered from 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceView {
    pub index: usize,
    pub source: SourceCategory,
    pub content: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl EvidenceView {
    /// Number the items from 1, cutting content to `max_chars` when given.
    pub fn number<'a>(
        items: impl IntoIterator<Item = &'a EvidenceItem>,
        max_chars: Option<usize>,
    ) -> Vec<EvidenceView> {
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| EvidenceView {
                index: i + 1,
                source: item.source,
                content: match max_chars {
                    Some(n) => item.excerpt(n),
                    None => item.content.clone(),
                },
                labels: item.metadata.labels(),
            })
            .collect()
    }
}

// --- understand ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderstandInput {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderstandOutput {
    pub intent: Intent,
    pub topic: String,
    pub needs_memory: bool,
    pub complexity: Complexity,
}

impl UnderstandOutput {
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["intent", "topic", "needs_memory", "complexity"],
            "properties": {
                "intent": { "type": "string", "enum": ["debugging", "explanation", "comparison", "how_to"] },
                "topic": { "type": "string" },
                "needs_memory": { "type": "boolean" },
                "complexity": { "type": "string", "enum": ["simple", "moderate", "complex"] }
            }
        })
    }
}

// --- route ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteInput {
    pub query: String,
    pub intent: Intent,
    pub topic: String,
    pub needs_memory: bool,
    pub complexity: Complexity,
    /// Sources the routing principles pick for this intent
    pub baseline: Vec<SourceCategory>,
    /// Sources queried in the previous round (retries only)
    #[serde(default)]
    pub previous_sources: Vec<SourceCategory>,
    #[serde(default)]
    pub missing_aspects: Vec<String>,
    #[serde(default)]
    pub suggested_sources: Vec<SourceCategory>,
}

impl RouteInput {
    pub fn is_retry(&self) -> bool {
        !self.previous_sources.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteOutput {
    pub selected_sources: Vec<SourceCategory>,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_retry_allowed")]
    pub retry_allowed: bool,
    #[serde(default)]
    pub reasoning: String,
}

fn default_retry_allowed() -> bool {
    true
}

impl RouteOutput {
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["selected_sources", "strategy", "retry_allowed", "reasoning"],
            "properties": {
                "selected_sources": {
                    "type": "array",
                    "minItems": 1,
                    "items": { "type": "string", "enum": ["docs", "code", "tickets", "memory"] }
                },
                "strategy": { "type": "string", "enum": ["parallel", "sequential"] },
                "retry_allowed": { "type": "boolean" },
                "reasoning": { "type": "string" }
            }
        })
    }
}

// --- evaluate ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateInput {
    pub query: String,
    pub evidence: Vec<EvidenceView>,
    pub sources_queried: Vec<SourceCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateOutput {
    pub is_sufficient: bool,
    pub confidence: f32,
    #[serde(default)]
    pub missing_aspects: Vec<String>,
    #[serde(default)]
    pub suggested_sources: Vec<SourceCategory>,
}

impl EvaluateOutput {
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["is_sufficient", "confidence", "missing_aspects", "suggested_sources"],
            "properties": {
                "is_sufficient": { "type": "boolean" },
                "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                "missing_aspects": { "type": "array", "items": { "type": "string" } },
                "suggested_sources": {
                    "type": "array",
                    "items": { "type": "string", "enum": ["docs", "code", "tickets", "memory"] }
                }
            }
        })
    }
}

// --- answer ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerInput {
    pub query: String,
    pub evidence: Vec<EvidenceView>,
}

/// A citation by evidence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitedEvidence {
    pub evidence: usize,
    #[serde(default)]
    pub relevance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOutput {
    pub answer: String,
    pub confidence: f32,
    #[serde(default)]
    pub citations: Vec<CitedEvidence>,
    #[serde(default)]
    pub insight: Option<String>,
}

impl AnswerOutput {
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["answer", "confidence", "citations"],
            "properties": {
                "answer": { "type": "string" },
                "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                "citations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["evidence"],
                        "properties": {
                            "evidence": { "type": "integer", "minimum": 1 },
                            "relevance": { "type": "string" }
                        }
                    }
                },
                "insight": { "type": ["string", "null"] }
            }
        })
    }
}
