//! # KnoRoute Core
//!
//! Domain types, traits, and error definitions for the KnoRoute adaptive
//! retrieval engine. This crate has **no framework dependencies**: it
//! defines the model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability is a trait here: knowledge stores
//! ([`KnowledgeStore`]), judgement ([`ReasoningService`]) and model
//! transport ([`Provider`]). Implementations live in their own crates, and
//! the retrieval workflow receives them by injection.
//!
//! Domain values validate on construction: a [`Query`] is never blank, a
//! [`Confidence`] is always in `[0, 1]`, a [`RoutingDecision`] always
//! selects at least one source, and an [`EvidencePool`] never holds two
//! items with the same [`Fingerprint`].

pub mod error;
pub mod source;
pub mod confidence;
pub mod query;
pub mod routing;
pub mod store;
pub mod evidence;
pub mod evaluation;
pub mod answer;
pub mod reasoning;
pub mod contract;
pub mod message;
pub mod provider;
pub mod event;
pub mod text;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, ValidationError, ReasoningError, StoreError, ProviderError};
pub use source::{SourceCategory, SourceSet, format_sources};
pub use confidence::Confidence;
pub use query::{Query, Intent, Complexity, Understanding};
pub use routing::{RoutingDecision, Strategy};
pub use store::{Document, KnowledgeBase, KnowledgeStore, MetadataFilter};
pub use evidence::{EvidenceItem, EvidencePool, Fingerprint, FingerprintPolicy, MergeStats, SourceMetadata};
pub use evaluation::{ConfidenceBand, EvaluationResult};
pub use answer::{Answer, Citation};
pub use reasoning::{PromptSpec, ReasoningService, ReasoningTask, StructuredValue};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use event::{EventBus, PipelineEvent};
