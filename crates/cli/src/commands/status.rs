//! `mailwright status`: Show the effective configuration.

use mailwright_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("✉️  Mailwright Status");
    println!("===================");
    match &config.source {
        Some(path) => println!("  Config file:  {}", path.display()),
        None => println!("  Config file:  (none, defaults)"),
    }
    println!("  Provider:     {}", config.provider);
    println!("  Model:        {}", config.effective_model());
    println!("  Temperature:  {}", config.temperature);
    match config.max_tokens {
        Some(max) => println!("  Max tokens:   {max}"),
        None => println!("  Max tokens:   provider default"),
    }
    println!("  API key:      {}", if config.has_api_key() { "configured" } else { "missing" });
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!("  CORS origins: {}", config.gateway.allowed_origins.join(", "));
    println!("  Credentials:  {}", config.mail.credentials_path.display());
    println!("  Token:        {}", config.mail.token_path.display());
    if let Some(sender) = &config.mail.sender {
        println!("  Send as:      {sender}");
    }

    Ok(())
}
