//! `knoroute status`: Show configuration and store sizes.

use knoroute_config::AppConfig;

use super::{build_router, load_config};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let router = build_router(&config)?;

    println!("🧭 KnoRoute Status");
    println!("==================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.reasoning.provider);
    println!("  Model:        {}", config.reasoning.model);
    println!("  Reasoner:     {}", router.reasoner_name());
    println!("  Top k:        {}", config.retrieval.top_k);
    println!("  Max retries:  {}", config.retrieval.max_retries);
    println!("  Feedback:     {}", if config.feedback.enabled { "enabled" } else { "disabled" });
    println!("  Stores:       {}", config.stores.backend);
    if config.stores.backend == "file" {
        println!("  Data dir:     {}", config.stores.resolved_data_dir().display());
    }
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);

    println!("\n  Documents:");
    for (category, count) in router.knowledge().stats().await? {
        println!("    {:<8} {count}", category.as_str());
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("\n  ⚠️  No config file. Run `knoroute init` to write one");
    }

    Ok(())
}
