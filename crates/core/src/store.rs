//! KnowledgeStore trait: one nearest-neighbor store per source category.
//!
//! Stores return documents nearest-first and accept pre-chunked documents
//! for insertion. How a store ranks is its own business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, StoreError};
use crate::source::SourceCategory;

/// A chunk of content held by a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Store-assigned identifier (empty until inserted)
    #[serde(default)]
    pub id: String,

    /// The chunk text
    pub content: String,

    /// Category-specific metadata (file_path, ticket_id, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Similarity score set by search operations
    #[serde(default)]
    pub score: f32,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            metadata: Map::new(),
            score: 0.0,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// A string metadata field, if present.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Exact-match metadata filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default)]
    pub equals: BTreeMap<String, Value>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.equals
            .iter()
            .all(|(k, v)| metadata.get(k).is_some_and(|m| m == v))
    }
}

/// The core KnowledgeStore trait.
///
/// Implementations: in-memory (keyword overlap), JSONL file-backed.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Which category this store serves.
    fn category(&self) -> SourceCategory;

    /// Up to `k` documents, nearest first.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> std::result::Result<Vec<Document>, StoreError>;

    /// Insert documents, returning their assigned IDs in input order.
    async fn insert(&self, documents: Vec<Document>) -> std::result::Result<Vec<String>, StoreError>;

    /// Total documents held.
    async fn count(&self) -> std::result::Result<usize, StoreError>;
}

/// The four stores, one per category.
#[derive(Clone)]
pub struct KnowledgeBase {
    docs: Arc<dyn KnowledgeStore>,
    code: Arc<dyn KnowledgeStore>,
    tickets: Arc<dyn KnowledgeStore>,
    memory: Arc<dyn KnowledgeStore>,
}

impl KnowledgeBase {
    /// Assemble a knowledge base, checking each store serves the slot it fills.
    pub fn new(
        docs: Arc<dyn KnowledgeStore>,
        code: Arc<dyn KnowledgeStore>,
        tickets: Arc<dyn KnowledgeStore>,
        memory: Arc<dyn KnowledgeStore>,
    ) -> crate::Result<Self> {
        for (expected, store) in [
            (SourceCategory::Docs, &docs),
            (SourceCategory::Code, &code),
            (SourceCategory::Tickets, &tickets),
            (SourceCategory::Memory, &memory),
        ] {
            if store.category() != expected {
                return Err(Error::Config {
                    message: format!(
                        "store '{}' serves {} but was placed in the {} slot",
                        store.name(),
                        store.category(),
                        expected
                    ),
                });
            }
        }
        Ok(Self {
            docs,
            code,
            tickets,
            memory,
        })
    }

    pub fn store(&self, category: SourceCategory) -> &Arc<dyn KnowledgeStore> {
        match category {
            SourceCategory::Docs => &self.docs,
            SourceCategory::Code => &self.code,
            SourceCategory::Tickets => &self.tickets,
            SourceCategory::Memory => &self.memory,
        }
    }

    pub fn memory(&self) -> &Arc<dyn KnowledgeStore> {
        &self.memory
    }

    /// Document counts per category.
    pub async fn stats(&self) -> std::result::Result<BTreeMap<SourceCategory, usize>, StoreError> {
        let mut stats = BTreeMap::new();
        for category in SourceCategory::ALL {
            stats.insert(category, self.store(category).count().await?);
        }
        Ok(stats)
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("docs", &self.docs.name())
            .field("code", &self.code.name())
            .field("tickets", &self.tickets.name())
            .field("memory", &self.memory.name())
            .finish()
    }
}
