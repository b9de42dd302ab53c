//! Build a [`KnowledgeBase`] from configuration.

use knoroute_config::StoresConfig;
use knoroute_core::error::Error;
use knoroute_core::source::SourceCategory;
use knoroute_core::store::{KnowledgeBase, KnowledgeStore};
use std::sync::Arc;
use tracing::info;

use crate::{FileStore, InMemoryStore};

/// One store per category, using the configured backend.
pub fn build_knowledge_base(config: &StoresConfig) -> Result<KnowledgeBase, Error> {
    let make = |category: SourceCategory| -> Result<Arc<dyn KnowledgeStore>, Error> {
        match config.backend.as_str() {
            "memory" => Ok(Arc::new(InMemoryStore::new(category))),
            "file" => Ok(Arc::new(FileStore::in_dir(category, &config.resolved_data_dir()))),
            other => Err(Error::Config {
                message: format!("Unknown store backend: {other}"),
            }),
        }
    };

    let kb = KnowledgeBase::new(
        make(SourceCategory::Docs)?,
        make(SourceCategory::Code)?,
        make(SourceCategory::Tickets)?,
        make(SourceCategory::Memory)?,
    )?;
    info!(backend = %config.backend, "Knowledge base ready");
    Ok(kb)
}

/// A volatile knowledge base, handy for tests and demos.
pub fn in_memory_knowledge_base() -> Result<KnowledgeBase, Error> {
    build_knowledge_base(&StoresConfig {
        backend: "memory".into(),
        data_dir: None,
    })
}
