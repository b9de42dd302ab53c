//! Knowledge source categories.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// One of the four logical knowledge stores.
///
/// The derived ordering is the canonical fetch order: docs, code,
/// tickets, memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    /// Product documentation, guides, API references
    #[serde(alias = "documentation")]
    Docs,
    /// Source code and implementation details
    Code,
    /// Issue history, bug reports, resolved incidents
    #[serde(alias = "issues")]
    Tickets,
    /// Insights learned from earlier queries
    Memory,
}

/// An ordered, duplicate-free set of categories.
pub type SourceSet = BTreeSet<SourceCategory>;

impl SourceCategory {
    pub const ALL: [SourceCategory; 4] = [
        SourceCategory::Docs,
        SourceCategory::Code,
        SourceCategory::Tickets,
        SourceCategory::Memory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docs => "docs",
            Self::Code => "code",
            Self::Tickets => "tickets",
            Self::Memory => "memory",
        }
    }

    /// What the store holds, phrased for routing prompts.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Docs => "product documentation, guides, API references, architecture docs",
            Self::Code => "source code, implementation details, function definitions",
            Self::Tickets => "bug reports, issues, resolved problems, incident history",
            Self::Memory => "previously learned insights, patterns, best practices",
        }
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docs" | "documentation" => Ok(Self::Docs),
            "code" => Ok(Self::Code),
            "tickets" | "issues" => Ok(Self::Tickets),
            "memory" => Ok(Self::Memory),
            other => Err(ValidationError::UnknownSource(other.to_string())),
        }
    }
}

/// Render a set as `docs, code` for logs and prompts.
pub fn format_sources<'a>(sources: impl IntoIterator<Item = &'a SourceCategory>) -> String {
    sources
        .into_iter()
        .map(SourceCategory::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
