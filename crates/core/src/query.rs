//! The user's question and what we understood about it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// A validated, trimmed, non-empty question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    pub fn new(text: impl Into<String>) -> Result<Self, ValidationError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Query {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the user is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Fixing errors, investigating failures
    Debugging,
    /// Understanding how something works
    Explanation,
    /// Comparing alternatives
    Comparison,
    /// Step-by-step instructions
    #[serde(alias = "how-to", alias = "howto")]
    HowTo,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debugging => "debugging",
            Self::Explanation => "explanation",
            Self::Comparison => "comparison",
            Self::HowTo => "how_to",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
        })
    }
}

/// Classification of a query, produced once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Understanding {
    intent: Intent,
    topic: String,
    needs_memory: bool,
    complexity: Complexity,
}

impl Understanding {
    pub fn new(
        intent: Intent,
        topic: impl Into<String>,
        needs_memory: bool,
        complexity: Complexity,
    ) -> Result<Self, ValidationError> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        Ok(Self {
            intent,
            topic,
            needs_memory,
            complexity,
        })
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn needs_memory(&self) -> bool {
        self.needs_memory
    }

    pub fn complexity(&self) -> Complexity {
        self.complexity
    }
}
