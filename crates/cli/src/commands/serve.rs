//! `mailwright serve`: Start the HTTP gateway.

use mailwright_config::AppConfig;

pub async fn run(
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(host) = host_override {
        config.gateway.host = host;
    }
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("✉️  Mailwright Gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.provider, config.effective_model());
    if !config.has_api_key() {
        println!("   ⚠️  No API key yet; POST /api/config/reload after setting one");
    }

    tracing::debug!(config = ?config, "Effective configuration");
    mailwright_gateway::start(config).await?;

    Ok(())
}
