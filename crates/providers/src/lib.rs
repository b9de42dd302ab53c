//! Reasoning service and LLM provider implementations for KnoRoute.
//!
//! - [`OpenAiCompatProvider`] implements `knoroute_core::Provider` for any
//!   OpenAI-compatible chat-completion endpoint.
//! - [`LlmReasoner`] implements `knoroute_core::ReasoningService` on top of a
//!   provider.
//! - [`HeuristicReasoner`] implements it offline, without a model.
//!
//! [`build_reasoner`] picks one based on configuration.

pub mod factory;
pub mod heuristic;
pub mod llm_reasoner;
pub mod openai_compat;

pub use factory::{build_provider, build_reasoner};
pub use heuristic::HeuristicReasoner;
pub use llm_reasoner::LlmReasoner;
pub use openai_compat::OpenAiCompatProvider;
