//! Insight feedback: write learned lessons back to the memory store.
//!
//! The duplicate check is a lookup followed by an insert, not an atomic
//! operation. Two writers racing on the same insight can both insert it;
//! the cost is a duplicate memory entry, never a corrupt one.

use chrono::Utc;
use knoroute_core::confidence::Confidence;
use knoroute_core::error::{Error, ValidationError};
use knoroute_core::store::{Document, KnowledgeStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// What happened to one insight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedbackOutcome {
    Stored { id: String },
    Skipped,
}

impl FeedbackOutcome {
    pub fn memory_id(&self) -> Option<&str> {
        match self {
            Self::Stored { id } => Some(id),
            Self::Skipped => None,
        }
    }
}

/// One insight to write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRecord {
    pub insight: String,
    /// The query the insight was learned from
    pub learned_from: String,
    pub confidence: f32,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl InsightRecord {
    pub fn new(insight: impl Into<String>, learned_from: impl Into<String>, confidence: f32) -> Self {
        Self {
            insight: insight.into(),
            learned_from: learned_from.into(),
            confidence,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

pub struct InsightWriter {
    memory: Arc<dyn KnowledgeStore>,
}

impl InsightWriter {
    pub fn new(memory: Arc<dyn KnowledgeStore>) -> Self {
        Self { memory }
    }

    /// Write one insight unless the memory store already holds it.
    pub async fn write_insight(&self, record: &InsightRecord) -> Result<FeedbackOutcome, Error> {
        let confidence = Confidence::new(record.confidence)?;
        let insight = record.insight.trim();
        if insight.is_empty() {
            return Err(ValidationError::EmptyInsight.into());
        }
        if record.learned_from.trim().is_empty() {
            return Err(ValidationError::EmptyLearnedFrom.into());
        }

        let nearest = self.memory.search(insight, 1, None).await?;
        if nearest.first().is_some_and(|doc| doc.content.trim() == insight) {
            debug!(learned_from = %record.learned_from, "Insight already in memory");
            return Ok(FeedbackOutcome::Skipped);
        }

        let document = Document::new(insight)
            .with_metadata("learned_from", record.learned_from.as_str())
            .with_metadata("confidence", confidence.value())
            .with_metadata("created_at", Utc::now().to_rfc3339())
            .with_metadata("tags", record.tags.clone());
        let ids = self.memory.insert(vec![document]).await?;
        let id = ids
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal("memory store returned no id for an insert".into()))?;

        info!(memory_id = %id, confidence = %confidence, "Insight stored");
        Ok(FeedbackOutcome::Stored { id })
    }

    /// Write several insights in order, one outcome per record.
    ///
    /// Stops at the first failure; earlier records stay written.
    pub async fn write_batch(&self, records: &[InsightRecord]) -> Result<Vec<FeedbackOutcome>, Error> {
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            outcomes.push(self.write_insight(record).await?);
        }
        Ok(outcomes)
    }
}
