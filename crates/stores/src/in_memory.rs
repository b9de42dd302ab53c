//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use knoroute_core::error::StoreError;
use knoroute_core::source::SourceCategory;
use knoroute_core::store::{Document, KnowledgeStore, MetadataFilter};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{ranking, schema};

/// A store that keeps one category's documents in a Vec.
pub struct InMemoryStore {
    category: SourceCategory,
    documents: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryStore {
    pub fn new(category: SourceCategory) -> Self {
        Self {
            category,
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

/// Validate, fill defaults and assign IDs.
pub(crate) fn prepare(
    category: SourceCategory,
    documents: Vec<Document>,
) -> Result<Vec<Document>, StoreError> {
    documents
        .into_iter()
        .map(|mut doc| {
            schema::apply(category, &mut doc)?;
            if doc.id.is_empty() {
                doc.id = Uuid::new_v4().to_string();
            }
            doc.score = 0.0;
            Ok(doc)
        })
        .collect()
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn category(&self) -> SourceCategory {
        self.category
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(ranking::rank(&documents, query, k, filter))
    }

    async fn insert(&self, documents: Vec<Document>) -> Result<Vec<String>, StoreError> {
        let prepared = prepare(self.category, documents)?;
        let ids = prepared.iter().map(|d| d.id.clone()).collect();
        self.documents.write().await.extend(prepared);
        Ok(ids)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.documents.read().await.len())
    }
}
