//! File-based store: persistent JSON-lines storage, one file per category.
//!
//! Each line is a JSON-encoded [`Document`]. Documents are loaded into
//! memory on creation and flushed to disk on every insert, which gives
//! fast reads with durable writes.
//!
//! Storage location: `<data_dir>/<category>.jsonl` (default data dir
//! `~/.knoroute/stores`).

use async_trait::async_trait;
use knoroute_core::error::StoreError;
use knoroute_core::source::SourceCategory;
use knoroute_core::store::{Document, KnowledgeStore, MetadataFilter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::in_memory::prepare;
use crate::ranking;

/// A file-backed store using JSONL (one JSON object per line).
pub struct FileStore {
    category: SourceCategory,
    path: PathBuf,
    documents: Arc<RwLock<Vec<Document>>>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// If the file exists, documents are loaded from it.
    /// If it does not, the store starts empty (file created on first insert).
    pub fn new(category: SourceCategory, path: PathBuf) -> Self {
        let documents = Self::load_from_disk(&path);
        debug!(%category, path = %path.display(), count = documents.len(), "File store loaded");
        Self {
            category,
            path,
            documents: Arc::new(RwLock::new(documents)),
        }
    }

    /// Open `<dir>/<category>.jsonl`.
    pub fn in_dir(category: SourceCategory, dir: &Path) -> Self {
        Self::new(category, dir.join(format!("{category}.jsonl")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<Document> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // Nothing written yet
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Document>(line) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Skipping corrupted document line");
                    None
                }
            })
            .collect()
    }

    /// Flush all documents to disk as JSONL.
    async fn flush(&self) -> Result<(), StoreError> {
        let documents = self.documents.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for doc in documents.iter() {
            let line = serde_json::to_string(doc).map_err(|e| {
                StoreError::Storage(format!("Failed to serialize document: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| StoreError::Storage(format!("Failed to write store file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for FileStore {
    fn name(&self) -> &str {
        "file"
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
        self.flush().await?;
        Ok(ids)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.documents.read().await.len())
    }
}
