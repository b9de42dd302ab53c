//! Knowledge store implementations for KnoRoute.
//!
//! Both bundled stores rank by keyword overlap (see [`ranking`]) and apply
//! the per-category metadata rules in [`schema`] on insert.

pub mod ranking;
pub mod schema;
pub mod in_memory;
pub mod file_backend;
pub mod factory;

pub use in_memory::InMemoryStore;
pub use file_backend::FileStore;
pub use factory::{build_knowledge_base, in_memory_knowledge_base};
