//! `knoroute load`: Load pre-chunked documents into one store.

use knoroute_core::source::SourceCategory;
use knoroute_core::store::Document;
use std::path::Path;

use super::load_config;

pub async fn run(category: &str, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let category: SourceCategory = category.parse()?;
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let documents = parse_documents(&content)
        .map_err(|e| format!("{} is not a JSON array of documents: {e}", file.display()))?;

    let config = load_config()?;
    let knowledge = knoroute_stores::build_knowledge_base(&config.stores)?;
    let store = knowledge.store(category);

    let count = documents.len();
    let ids = store.insert(documents).await?;
    let total = store.count().await?;

    println!("✅ Loaded {count} document(s) into {category} ({total} total)");
    tracing::debug!(%category, ids = ?ids, "Inserted documents");
    Ok(())
}

/// Documents carry at least `content`; `metadata` and `id` are optional.
fn parse_documents(content: &str) -> Result<Vec<Document>, serde_json::Error> {
    serde_json::from_str(content)
}
