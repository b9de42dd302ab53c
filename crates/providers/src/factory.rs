//! Build the reasoning service from configuration.
//!
//! `reasoning.provider = "heuristic"` always selects the offline reasoner.
//! Any other provider is reached through the OpenAI-compatible client; if
//! it needs an API key and none is configured, the offline reasoner is
//! used instead and a warning is logged.

use knoroute_config::AppConfig;
use knoroute_core::error::Error;
use knoroute_core::provider::Provider;
use knoroute_core::reasoning::ReasoningService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::heuristic::HeuristicReasoner;
use crate::llm_reasoner::LlmReasoner;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the chat-completion provider, or `None` when running offline.
pub fn build_provider(config: &AppConfig) -> Result<Option<Arc<dyn Provider>>, Error> {
    let name = config.reasoning.provider.as_str();
    if name == "heuristic" {
        return Ok(None);
    }

    let base_url = match (&config.reasoning.api_url, default_base_url(name)) {
        (Some(url), _) => url.clone(),
        (None, Some(url)) => url.to_string(),
        (None, None) => {
            return Err(Error::Config {
                message: format!("Provider '{name}' needs reasoning.api_url"),
            });
        }
    };

    let api_key = match (&config.api_key, needs_api_key(name)) {
        (Some(key), _) => key.clone(),
        (None, false) => String::new(),
        (None, true) => {
            warn!(provider = %name, "No API key configured, using the heuristic reasoner");
            return Ok(None);
        }
    };

    let timeout = Duration::from_secs(config.reasoning.timeout_secs);
    Ok(Some(Arc::new(OpenAiCompatProvider::with_timeout(
        name, base_url, api_key, timeout,
    ))))
}

/// Build the reasoning service the workflow will use.
pub fn build_reasoner(config: &AppConfig) -> Result<Arc<dyn ReasoningService>, Error> {
    let reasoner: Arc<dyn ReasoningService> = match build_provider(config)? {
        Some(provider) => Arc::new(
            LlmReasoner::new(provider, &config.reasoning.model)
                .with_temperature(config.reasoning.temperature)
                .with_max_tokens(config.reasoning.max_tokens)
                .with_timeout(Duration::from_secs(config.reasoning.timeout_secs)),
        ),
        None => Arc::new(HeuristicReasoner::new()),
    };
    info!(reasoner = %reasoner.name(), "Reasoning service ready");
    Ok(reasoner)
}

fn needs_api_key(provider_name: &str) -> bool {
    !matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        "llamacpp" | "llama.cpp" => Some("http://localhost:8080/v1"),
        _ => None,
    }
}
