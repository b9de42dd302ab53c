//! Evidence items and the deduplicated pool they accumulate in.
//!
//! Every retrieved document becomes an [`EvidenceItem`] tagged with the
//! category it came from and a content [`Fingerprint`]. The
//! [`EvidencePool`] holds at most one item per fingerprint and only ever
//! grows across retrieval rounds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

use crate::source::SourceCategory;
use crate::store::Document;

/// Hex SHA-256 digest identifying an item's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How much of an item's content feeds its fingerprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FingerprintPolicy {
    /// The whole whitespace-normalized content.
    #[default]
    FullContent,
    /// Only the first N characters of the normalized content.
    Prefix(usize),
}

impl FingerprintPolicy {
    pub fn from_prefix(prefix_chars: Option<usize>) -> Self {
        match prefix_chars {
            Some(n) if n > 0 => Self::Prefix(n),
            _ => Self::FullContent,
        }
    }

    pub fn fingerprint(&self, content: &str) -> Fingerprint {
        let normalized = content.split_whitespace().collect::<Vec<_>>().join(" ");
        let keyed: String = match self {
            Self::FullContent => normalized,
            Self::Prefix(n) => normalized.chars().take(*n).collect(),
        };
        let digest = Sha256::digest(keyed.as_bytes());
        Fingerprint(hex::encode(digest))
    }
}

/// Category-specific provenance for an evidence item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum SourceMetadata {
    Docs {
        source: String,
        doc_type: String,
        section: String,
        version: String,
    },
    Code {
        file_path: String,
        language: String,
        function_name: String,
        line_range: String,
    },
    Tickets {
        ticket_id: String,
        status: String,
        severity: String,
        created_at: String,
    },
    Memory {
        learned_from: String,
        confidence: f32,
        created_at: String,
        tags: Vec<String>,
    },
}

fn text(metadata: &Map<String, Value>, key: &str, fallback: &str) -> String {
    match metadata.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}

impl SourceMetadata {
    /// Read provenance out of a store document's metadata map.
    pub fn from_map(category: SourceCategory, metadata: &Map<String, Value>) -> Self {
        match category {
            SourceCategory::Docs => Self::Docs {
                source: text(metadata, "source", "unknown"),
                doc_type: text(metadata, "doc_type", "guide"),
                section: text(metadata, "section", "root"),
                version: text(metadata, "version", "latest"),
            },
            SourceCategory::Code => Self::Code {
                file_path: text(metadata, "file_path", "unknown"),
                language: text(metadata, "language", "unknown"),
                function_name: text(metadata, "function_name", ""),
                line_range: text(metadata, "line_range", ""),
            },
            SourceCategory::Tickets => Self::Tickets {
                ticket_id: text(metadata, "ticket_id", "unknown"),
                status: text(metadata, "status", "open"),
                severity: text(metadata, "severity", "medium"),
                created_at: text(metadata, "created_at", ""),
            },
            SourceCategory::Memory => Self::Memory {
                learned_from: text(metadata, "learned_from", ""),
                confidence: metadata
                    .get("confidence")
                    .and_then(Value::as_f64)
                    .map(|c| c as f32)
                    .unwrap_or(0.8),
                created_at: text(metadata, "created_at", ""),
                tags: metadata
                    .get("tags")
                    .and_then(Value::as_array)
                    .map(|tags| {
                        tags.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
        }
    }

    /// Short "Key: value" lines shown next to evidence in prompts.
    pub fn labels(&self) -> Vec<String> {
        match self {
            Self::Docs {
                doc_type, section, ..
            } => vec![format!("Type: {doc_type}"), format!("Section: {section}")],
            Self::Code {
                file_path,
                function_name,
                ..
            } => {
                let mut labels = vec![format!("File: {file_path}")];
                if !function_name.is_empty() {
                    labels.push(format!("Function: {function_name}"));
                }
                labels
            }
            Self::Tickets {
                ticket_id,
                severity,
                ..
            } => vec![format!("Ticket: {ticket_id}"), format!("Severity: {severity}")],
            Self::Memory { learned_from, .. } => vec![format!("Learned from: {learned_from}")],
        }
    }

    /// The most identifying locator: doc source, file path, ticket id, or
    /// originating query.
    pub fn locator(&self) -> &str {
        match self {
            Self::Docs { source, .. } => source,
            Self::Code { file_path, .. } => file_path,
            Self::Tickets { ticket_id, .. } => ticket_id,
            Self::Memory { learned_from, .. } => learned_from,
        }
    }
}

/// One retrieved unit of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub source: SourceCategory,
    pub document_id: String,
    pub content: String,
    pub metadata: SourceMetadata,
    pub score: f32,
    pub fingerprint: Fingerprint,
}

impl EvidenceItem {
    pub fn from_document(source: SourceCategory, document: Document, policy: &FingerprintPolicy) -> Self {
        let fingerprint = policy.fingerprint(&document.content);
        let metadata = SourceMetadata::from_map(source, &document.metadata);
        Self {
            source,
            document_id: document.id,
            content: document.content,
            metadata,
            score: document.score,
            fingerprint,
        }
    }

    /// Content cut to at most `max_chars` characters, with an ellipsis when cut.
    pub fn excerpt(&self, max_chars: usize) -> String {
        if self.content.chars().count() <= max_chars {
            return self.content.clone();
        }
        let mut cut: String = self.content.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}

/// Counts from merging one retrieval round into the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub fetched: usize,
    pub admitted: usize,
    pub duplicates: usize,
}

/// Evidence accumulated across all rounds, unique by fingerprint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidencePool {
    items: Vec<EvidenceItem>,
    #[serde(skip)]
    seen: HashSet<Fingerprint>,
}

impl EvidencePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch, keeping the first occurrence of each fingerprint.
    pub fn merge(&mut self, batch: impl IntoIterator<Item = EvidenceItem>) -> MergeStats {
        let mut stats = MergeStats::default();
        for item in batch {
            stats.fetched += 1;
            if self.seen.insert(item.fingerprint.clone()) {
                self.items.push(item);
                stats.admitted += 1;
            } else {
                stats.duplicates += 1;
            }
        }
        stats
    }

    pub fn items(&self) -> &[EvidenceItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EvidenceItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up an item by its 1-based position, as shown in prompts.
    pub fn cited(&self, index: usize) -> Option<&EvidenceItem> {
        index.checked_sub(1).and_then(|i| self.items.get(i))
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }
}
