//! Sufficiency verdicts over the evidence pool.

use serde::Serialize;
use std::fmt;

use crate::confidence::Confidence;
use crate::error::ValidationError;
use crate::source::{SourceCategory, SourceSet};

/// Coarse reading of an evaluation's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    /// Below 0.5
    Insufficient,
    /// 0.5 up to 0.7
    Moderate,
    /// 0.7 up to 0.9
    Good,
    /// 0.9 and above
    Excellent,
}

impl ConfidenceBand {
    pub fn of(confidence: Confidence) -> Self {
        match confidence.value() {
            c if c >= 0.9 => Self::Excellent,
            c if c >= 0.7 => Self::Good,
            c if c >= 0.5 => Self::Moderate,
            _ => Self::Insufficient,
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insufficient => "insufficient",
            Self::Moderate => "moderate",
            Self::Good => "good",
            Self::Excellent => "excellent",
        })
    }
}

/// Whether the pool can answer the question, and if not, what is missing.
///
/// An insufficient result always names at least one missing aspect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    is_sufficient: bool,
    confidence: Confidence,
    missing_aspects: Vec<String>,
    suggested_sources: SourceSet,
}

impl EvaluationResult {
    pub fn new(
        is_sufficient: bool,
        confidence: Confidence,
        missing_aspects: impl IntoIterator<Item = String>,
        suggested_sources: impl IntoIterator<Item = SourceCategory>,
    ) -> Result<Self, ValidationError> {
        let mut aspects: Vec<String> = Vec::new();
        for aspect in missing_aspects {
            let aspect = aspect.trim().to_string();
            if !aspect.is_empty() && !aspects.contains(&aspect) {
                aspects.push(aspect);
            }
        }
        if !is_sufficient && aspects.is_empty() {
            return Err(ValidationError::MissingAspectsRequired);
        }
        Ok(Self {
            is_sufficient,
            confidence,
            missing_aspects: aspects,
            suggested_sources: suggested_sources.into_iter().collect(),
        })
    }

    /// A sufficient verdict with no gaps.
    pub fn sufficient(confidence: Confidence) -> Self {
        Self {
            is_sufficient: true,
            confidence,
            missing_aspects: Vec::new(),
            suggested_sources: SourceSet::new(),
        }
    }

    pub fn is_sufficient(&self) -> bool {
        self.is_sufficient
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::of(self.confidence)
    }

    pub fn missing_aspects(&self) -> &[String] {
        &self.missing_aspects
    }

    pub fn suggested_sources(&self) -> &SourceSet {
        &self.suggested_sources
    }

    /// Replace the suggestions, keeping everything else.
    pub fn with_suggested_sources(mut self, sources: SourceSet) -> Self {
        self.suggested_sources = sources;
        self
    }
}
