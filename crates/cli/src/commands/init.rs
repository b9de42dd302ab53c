//! `knoroute init`: Write a default config file.

use knoroute_config::AppConfig;

pub async fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() && !force {
        println!("  Config file exists: {}", config_path.display());
        println!("  Use --force to overwrite it.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Wrote {}", config_path.display());

    let data_dir = AppConfig::default().stores.resolved_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    println!("✅ Store directory: {}", data_dir.display());

    println!("\nNext steps:");
    println!("  export KNOROUTE_API_KEY=...   (or set reasoning.provider = \"heuristic\")");
    println!("  knoroute load docs ./docs.json");
    println!("  knoroute query \"How do I rotate API keys?\"");
    Ok(())
}
