//! Shared test doubles for workflow tests.

use async_trait::async_trait;
use knoroute_core::error::{ReasoningError, StoreError};
use knoroute_core::reasoning::{PromptSpec, ReasoningService, ReasoningTask, StructuredValue};
use knoroute_core::source::SourceCategory;
use knoroute_core::store::{Document, KnowledgeBase, KnowledgeStore, MetadataFilter};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

type Reply = Result<StructuredValue, ReasoningError>;

/// A reasoning service that returns queued replies per task.
///
/// The last queued reply for a task is repeated once the queue drains.
/// Panics if a task has no replies at all.
#[derive(Default)]
pub struct ScriptedReasoner {
    replies: Mutex<HashMap<ReasoningTask, VecDeque<Reply>>>,
    prompts: Mutex<Vec<PromptSpec>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, task: ReasoningTask, value: StructuredValue) -> Self {
        self.push(task, Ok(value))
    }

    pub fn fail(self, task: ReasoningTask, error: ReasoningError) -> Self {
        self.push(task, Err(error))
    }

    fn push(self, task: ReasoningTask, reply: Reply) -> Self {
        self.replies.lock().unwrap().entry(task).or_default().push_back(reply);
        self
    }

    pub fn prompts(&self) -> Vec<PromptSpec> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self, task: ReasoningTask) -> usize {
        self.prompts.lock().unwrap().iter().filter(|p| p.task == task).count()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: PromptSpec) -> Result<StructuredValue, ReasoningError> {
        let task = prompt.task;
        self.prompts.lock().unwrap().push(prompt);
        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(&task)
            .unwrap_or_else(|| panic!("ScriptedReasoner: no replies for task {task}"));
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

/// A store that returns its documents in insertion order, ignoring the query.
pub struct StaticStore {
    category: SourceCategory,
    documents: RwLock<Vec<Document>>,
    searches: AtomicUsize,
}

impl StaticStore {
    pub fn new(category: SourceCategory, contents: &[&str]) -> Self {
        let documents = contents
            .iter()
            .enumerate()
            .map(|(i, c)| Document::new(*c).with_id(format!("{category}-{i}")))
            .collect();
        Self {
            category,
            documents: RwLock::new(documents),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn empty(category: SourceCategory) -> Self {
        Self::new(category, &[])
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub async fn documents(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }
}

#[async_trait]
impl KnowledgeStore for StaticStore {
    fn name(&self) -> &str {
        "static"
    }

    fn category(&self) -> SourceCategory {
        self.category
    }

    async fn search(
        &self,
        _query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>, StoreError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .filter(|d| filter.is_none_or(|f| f.matches(&d.metadata)))
            .take(k)
            .cloned()
            .collect())
    }

    async fn insert(&self, documents: Vec<Document>) -> Result<Vec<String>, StoreError> {
        let mut stored = self.documents.write().await;
        let mut ids = Vec::new();
        for mut doc in documents {
            doc.id = format!("{}-{}", self.category, stored.len());
            ids.push(doc.id.clone());
            stored.push(doc);
        }
        Ok(ids)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.documents.read().await.len())
    }
}

/// A store that is always down.
pub struct FailingStore {
    category: SourceCategory,
}

impl FailingStore {
    pub fn new(category: SourceCategory) -> Self {
        Self { category }
    }
}

#[async_trait]
impl KnowledgeStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    fn category(&self) -> SourceCategory {
        self.category
    }

    async fn search(&self, _: &str, _: usize, _: Option<&MetadataFilter>) -> Result<Vec<Document>, StoreError> {
        Err(StoreError::Unavailable {
            category: self.category,
            reason: "connection refused".into(),
        })
    }

    async fn insert(&self, _: Vec<Document>) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Storage("read-only".into()))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// Four static stores with the given contents.
pub struct Fixture {
    pub docs: Arc<StaticStore>,
    pub code: Arc<StaticStore>,
    pub tickets: Arc<StaticStore>,
    pub memory: Arc<StaticStore>,
}

impl Fixture {
    pub fn new(docs: &[&str], code: &[&str], tickets: &[&str], memory: &[&str]) -> Self {
        Self {
            docs: Arc::new(StaticStore::new(SourceCategory::Docs, docs)),
            code: Arc::new(StaticStore::new(SourceCategory::Code, code)),
            tickets: Arc::new(StaticStore::new(SourceCategory::Tickets, tickets)),
            memory: Arc::new(StaticStore::new(SourceCategory::Memory, memory)),
        }
    }

    pub fn knowledge_base(&self) -> KnowledgeBase {
        KnowledgeBase::new(
            self.docs.clone(),
            self.code.clone(),
            self.tickets.clone(),
            self.memory.clone(),
        )
        .unwrap()
    }
}
