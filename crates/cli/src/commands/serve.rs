//! `knoroute serve`: Start the HTTP gateway.

use super::load_config;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🧭 KnoRoute Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Stores:    {}", config.stores.backend);

    knoroute_gateway::start(config).await?;

    Ok(())
}
