//! Routing decisions: which stores to consult this round.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::source::{SourceCategory, SourceSet, format_sources};

/// How the selected stores are fetched. Advisory: the retriever never
/// revises the query between sequential fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Parallel,
    Sequential,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        })
    }
}

/// The plan for one retrieval round. Never has an empty source set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    selected_sources: SourceSet,
    strategy: Strategy,
    retry_allowed: bool,
    reasoning: String,
}

impl RoutingDecision {
    pub fn new(
        selected_sources: impl IntoIterator<Item = SourceCategory>,
        strategy: Strategy,
        retry_allowed: bool,
        reasoning: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let selected_sources: SourceSet = selected_sources.into_iter().collect();
        if selected_sources.is_empty() {
            return Err(ValidationError::EmptySourceSet);
        }
        Ok(Self {
            selected_sources,
            strategy,
            retry_allowed,
            reasoning: reasoning.into(),
        })
    }

    pub fn selected_sources(&self) -> &SourceSet {
        &self.selected_sources
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn retry_allowed(&self) -> bool {
        self.retry_allowed
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Add sources to the plan. Returns how many were new.
    pub fn expand(&mut self, extra: impl IntoIterator<Item = SourceCategory>, note: &str) -> usize {
        let added = extra
            .into_iter()
            .filter(|c| self.selected_sources.insert(*c))
            .count();
        if added > 0 && !note.is_empty() {
            if !self.reasoning.is_empty() {
                self.reasoning.push(' ');
            }
            self.reasoning.push_str(note);
        }
        added
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] ({}, retry {})",
            format_sources(&self.selected_sources),
            self.strategy,
            if self.retry_allowed { "allowed" } else { "disallowed" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_rejected() {
        let err = RoutingDecision::new(Vec::new(), Strategy::Parallel, true, "").unwrap_err();
        assert_eq!(err, ValidationError::EmptySourceSet);
    }

    #[test]
    fn duplicates_collapse() {
        let d = RoutingDecision::new(
            [SourceCategory::Code, SourceCategory::Code, SourceCategory::Docs],
            Strategy::Sequential,
            false,
            "explain",
        )
        .unwrap();
        assert_eq!(d.selected_sources().len(), 2);
    }

    #[test]
    fn expand_counts_only_new_sources() {
        let mut d = RoutingDecision::new([SourceCategory::Docs], Strategy::Parallel, true, "start").unwrap();
        let added = d.expand([SourceCategory::Docs, SourceCategory::Tickets], "widened.");
        assert_eq!(added, 1);
        assert!(d.selected_sources().contains(&SourceCategory::Tickets));
        assert_eq!(d.reasoning(), "start widened.");
        assert_eq!(d.expand([SourceCategory::Docs], "noop"), 0);
        assert_eq!(d.reasoning(), "start widened.");
    }
}
