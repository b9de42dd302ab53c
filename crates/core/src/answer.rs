//! Grounded answers and the citations that back them.

use serde::{Deserialize, Serialize};

use crate::confidence::Confidence;
use crate::evidence::Fingerprint;
use crate::source::SourceCategory;

/// A reference from an answer to one item in the evidence pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: SourceCategory,
    pub fingerprint: Fingerprint,
    pub document_id: String,
    /// Where the evidence lives: file path, ticket id, doc source
    #[serde(default)]
    pub locator: String,
    /// Why this evidence supports the answer
    #[serde(default)]
    pub relevance: String,
}

/// The final response to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub confidence: Confidence,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight: Option<String>,
}

impl Answer {
    pub fn has_citations(&self) -> bool {
        !self.citations.is_empty()
    }
}
