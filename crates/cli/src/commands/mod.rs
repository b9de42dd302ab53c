pub mod doctor;
pub mod init;
pub mod insight;
pub mod load;
pub mod query;
pub mod serve;
pub mod status;

use knoroute_agent::{KnowledgeRouter, WorkflowSettings};
use knoroute_config::AppConfig;

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into())
}

/// Wire stores, reasoner and settings from configuration.
pub(crate) fn build_router(config: &AppConfig) -> Result<KnowledgeRouter, knoroute_core::Error> {
    let knowledge = knoroute_stores::build_knowledge_base(&config.stores)?;
    let reasoner = knoroute_providers::build_reasoner(config)?;
    Ok(KnowledgeRouter::new(
        knowledge,
        reasoner,
        WorkflowSettings::from(config),
    ))
}
