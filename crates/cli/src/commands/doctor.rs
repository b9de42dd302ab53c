//! `knoroute doctor`: Diagnose setup problems.

use knoroute_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 KnoRoute Doctor");
    println!("==================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, defaults in use (run `knoroute init`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 blocking issue found.");
            return Ok(());
        }
    };

    match knoroute_providers::build_provider(&config) {
        Ok(Some(provider)) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
            Ok(false) => {
                println!("  ❌ Provider '{}' rejected the health check", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        Ok(None) if config.reasoning.provider == "heuristic" => {
            println!("  ✅ Heuristic reasoner selected (offline)");
        }
        Ok(None) => {
            println!("  ⚠️  No API key, falling back to the heuristic reasoner");
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Provider misconfigured: {e}");
            issues += 1;
        }
    }

    match knoroute_stores::build_knowledge_base(&config.stores) {
        Ok(knowledge) => match knowledge.stats().await {
            Ok(stats) => {
                let total: usize = stats.values().sum();
                println!("  ✅ Stores readable ({total} documents)");
                for category in stats.iter().filter(|(_, count)| **count == 0).map(|(c, _)| c) {
                    println!("  ⚠️  {category} store is empty");
                    issues += 1;
                }
            }
            Err(e) => {
                println!("  ❌ Store error: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Stores unavailable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
