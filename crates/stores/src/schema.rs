//! Per-category metadata rules applied on insert.
//!
//! Each category has one required field and a set of defaults:
//!
//! | category | required      | defaults                                          |
//! |----------|---------------|---------------------------------------------------|
//! | docs     | `source`      | doc_type=guide, section=root, version=latest      |
//! | code     | `file_path`   | language=unknown, function_name="", line_range="" |
//! | tickets  | `ticket_id`   | status=open, severity=medium, created_at=now      |
//! | memory   | `learned_from`| confidence=0.8, created_at=now, tags=[]           |

use chrono::Utc;
use knoroute_core::error::StoreError;
use knoroute_core::source::SourceCategory;
use knoroute_core::store::Document;
use serde_json::{Value, json};

pub fn required_field(category: SourceCategory) -> &'static str {
    match category {
        SourceCategory::Docs => "source",
        SourceCategory::Code => "file_path",
        SourceCategory::Tickets => "ticket_id",
        SourceCategory::Memory => "learned_from",
    }
}

fn defaults(category: SourceCategory) -> Vec<(&'static str, Value)> {
    let now = Utc::now().to_rfc3339();
    match category {
        SourceCategory::Docs => vec![
            ("doc_type", json!("guide")),
            ("section", json!("root")),
            ("version", json!("latest")),
        ],
        SourceCategory::Code => vec![
            ("language", json!("unknown")),
            ("function_name", json!("")),
            ("line_range", json!("")),
        ],
        SourceCategory::Tickets => vec![
            ("status", json!("open")),
            ("severity", json!("medium")),
            ("created_at", json!(now)),
        ],
        SourceCategory::Memory => vec![
            ("confidence", json!(0.8)),
            ("created_at", json!(now)),
            ("tags", json!([])),
        ],
    }
}

/// Check the required field and fill missing defaults in place.
pub fn apply(category: SourceCategory, document: &mut Document) -> Result<(), StoreError> {
    if document.content.trim().is_empty() {
        return Err(StoreError::InvalidMetadata {
            category,
            reason: "document content is empty".into(),
        });
    }

    let required = required_field(category);
    match document.metadata.get(required) {
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        _ => {
            return Err(StoreError::InvalidMetadata {
                category,
                reason: format!("missing required field '{required}'"),
            });
        }
    }

    if category == SourceCategory::Memory {
        if let Some(c) = document.metadata.get("confidence") {
            match c.as_f64() {
                Some(v) if (0.0..=1.0).contains(&v) => {}
                _ => {
                    return Err(StoreError::InvalidMetadata {
                        category,
                        reason: format!("confidence must be a number in [0, 1], got {c}"),
                    });
                }
            }
        }
    }

    for (key, value) in defaults(category) {
        document.metadata.entry(key).or_insert(value);
    }
    Ok(())
}
