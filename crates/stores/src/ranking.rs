//! Keyword-overlap ranking shared by the bundled stores.
//!
//! A document scores the fraction of distinct query terms it contains,
//! plus a bonus when it contains the whole query as a phrase. A document
//! whose trimmed content equals the trimmed query outranks everything,
//! even when the query has no terms. Documents with no overlap are not
//! returned.

use knoroute_core::store::{Document, MetadataFilter};
use std::collections::HashSet;

pub use knoroute_core::text::terms;

const PHRASE_BONUS: f32 = 0.5;
const EXACT_MATCH: f32 = 2.0;

pub fn score(query: &str, query_terms: &HashSet<String>, content: &str) -> f32 {
    let query = query.trim();
    if !query.is_empty() && content.trim() == query {
        return EXACT_MATCH;
    }
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_terms: HashSet<String> = terms(content).into_iter().collect();
    let matched = query_terms.intersection(&content_terms).count();
    if matched == 0 {
        return 0.0;
    }
    let coverage = matched as f32 / query_terms.len() as f32;
    let phrase = content.to_lowercase().contains(&query.to_lowercase());
    coverage + if phrase { PHRASE_BONUS } else { 0.0 }
}

/// The `k` best-scoring documents, nearest first. Ties go to the shorter document.
pub fn rank(documents: &[Document], query: &str, k: usize, filter: Option<&MetadataFilter>) -> Vec<Document> {
    let query_terms: HashSet<String> = terms(query).into_iter().collect();

    let mut results: Vec<Document> = documents
        .iter()
        .filter(|d| filter.is_none_or(|f| f.matches(&d.metadata)))
        .filter_map(|d| {
            let s = score(query, &query_terms, &d.content);
            (s > 0.0).then(|| {
                let mut hit = d.clone();
                hit.score = s;
                hit
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.content.len().cmp(&b.content.len()))
    });
    results.truncate(k);
    results
}
