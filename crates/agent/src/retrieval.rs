//! Retriever: fetch from the selected stores and tag results as evidence.

use futures::future::join_all;
use knoroute_core::error::StoreError;
use knoroute_core::evidence::{EvidenceItem, FingerprintPolicy};
use knoroute_core::query::Query;
use knoroute_core::routing::{RoutingDecision, Strategy};
use knoroute_core::source::SourceCategory;
use knoroute_core::store::KnowledgeBase;
use tracing::{debug, warn};

/// How one round fetches.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub top_k: usize,
    pub policy: FingerprintPolicy,
    pub degrade_on_store_error: bool,
}

/// Fetch one round of evidence for `decision`.
///
/// Results are ordered by category (docs, code, tickets, memory) whatever
/// the strategy; within a category the store's ranking is kept.
pub async fn fetch_round(
    knowledge: &KnowledgeBase,
    query: &Query,
    decision: &RoutingDecision,
    options: FetchOptions,
) -> Result<Vec<EvidenceItem>, StoreError> {
    let sources = decision.selected_sources().iter().copied();

    let results: Vec<(SourceCategory, Result<Vec<EvidenceItem>, StoreError>)> = match decision.strategy() {
        Strategy::Parallel => {
            let fetches = sources.map(|category| async move {
                (category, fetch_one(knowledge, query, category, options).await)
            });
            join_all(fetches).await
        }
        Strategy::Sequential => {
            let mut results = Vec::new();
            for category in sources {
                results.push((category, fetch_one(knowledge, query, category, options).await));
            }
            results
        }
    };

    let mut batch = Vec::new();
    for (category, result) in results {
        match result {
            Ok(items) => batch.extend(items),
            Err(e) if options.degrade_on_store_error => {
                warn!(%category, error = %e, "Store failed, treating it as empty for this round");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(batch)
}

async fn fetch_one(
    knowledge: &KnowledgeBase,
    query: &Query,
    category: SourceCategory,
    options: FetchOptions,
) -> Result<Vec<EvidenceItem>, StoreError> {
    let documents = knowledge
        .store(category)
        .search(query.as_str(), options.top_k, None)
        .await?;
    debug!(%category, hits = documents.len(), "Store searched");
    Ok(documents
        .into_iter()
        .map(|doc| EvidenceItem::from_document(category, doc, &options.policy))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingStore, Fixture, StaticStore};
    use std::sync::Arc;

    fn options() -> FetchOptions {
        FetchOptions {
            top_k: 5,
            policy: FingerprintPolicy::default(),
            degrade_on_store_error: false,
        }
    }

    fn decision(sources: &[SourceCategory], strategy: Strategy) -> RoutingDecision {
        RoutingDecision::new(sources.iter().copied(), strategy, true, "").unwrap()
    }

    #[tokio::test]
    async fn parallel_results_are_in_canonical_order() {
        let fixture = Fixture::new(&["doc a"], &["code a", "code b"], &["ticket a"], &[]);
        let query = Query::new("anything").unwrap();
        let plan = decision(&[SourceCategory::Tickets, SourceCategory::Docs, SourceCategory::Code], Strategy::Parallel);

        let batch = fetch_round(&fixture.knowledge_base(), &query, &plan, options()).await.unwrap();
        let order: Vec<SourceCategory> = batch.iter().map(|i| i.source).collect();
        assert_eq!(
            order,
            vec![SourceCategory::Docs, SourceCategory::Code, SourceCategory::Code, SourceCategory::Tickets]
        );
        assert_eq!(fixture.memory.searches(), 0);
    }

    #[tokio::test]
    async fn sequential_matches_parallel() {
        let fixture = Fixture::new(&["doc a"], &["code a"], &[], &["memo"]);
        let query = Query::new("anything").unwrap();
        let kb = fixture.knowledge_base();
        let sources = [SourceCategory::Memory, SourceCategory::Docs];

        let par = fetch_round(&kb, &query, &decision(&sources, Strategy::Parallel), options()).await.unwrap();
        let seq = fetch_round(&kb, &query, &decision(&sources, Strategy::Sequential), options()).await.unwrap();
        assert_eq!(par, seq);
    }

    #[tokio::test]
    async fn top_k_caps_each_source() {
        let fixture = Fixture::new(&["a", "b", "c", "d"], &[], &[], &[]);
        let query = Query::new("anything").unwrap();
        let opts = FetchOptions { top_k: 2, ..options() };
        let batch = fetch_round(&fixture.knowledge_base(), &query, &decision(&[SourceCategory::Docs], Strategy::Parallel), opts)
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
    }

    fn kb_with_failing_tickets() -> KnowledgeBase {
        KnowledgeBase::new(
            Arc::new(StaticStore::new(SourceCategory::Docs, &["doc"])),
            Arc::new(StaticStore::new(SourceCategory::Code, &["code"])),
            Arc::new(FailingStore::new(SourceCategory::Tickets)),
            Arc::new(StaticStore::empty(SourceCategory::Memory)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn store_failure_aborts_by_default() {
        let query = Query::new("anything").unwrap();
        let plan = decision(&[SourceCategory::Docs, SourceCategory::Tickets], Strategy::Parallel);
        let err = fetch_round(&kb_with_failing_tickets(), &query, &plan, options()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { category: SourceCategory::Tickets, .. }));
    }

    #[tokio::test]
    async fn store_failure_degrades_when_enabled() {
        let query = Query::new("anything").unwrap();
        let plan = decision(&[SourceCategory::Docs, SourceCategory::Tickets], Strategy::Sequential);
        let opts = FetchOptions { degrade_on_store_error: true, ..options() };
        let batch = fetch_round(&kb_with_failing_tickets(), &query, &plan, opts).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].source, SourceCategory::Docs);
    }
}
