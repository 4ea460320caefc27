//! `mailwright doctor`: Diagnose configuration and credentials.

use mailwright_config::{AppConfig, CONFIG_PATH_ENV, key_env_vars};
use mailwright_mail::{ClientSecrets, TokenStore};
use mailwright_providers::{build_provider, needs_no_key};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Mailwright Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    println!("  Working directory: {}", std::env::current_dir()?.display());

    // Config file
    let config_path = AppConfig::config_path();
    println!("  Config file:       {}", config_path.display());
    if std::env::var_os(CONFIG_PATH_ENV).is_some() {
        println!("                     (from ${CONFIG_PATH_ENV})");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            if config_path.exists() {
                println!("  ✅ Config file valid");
            } else {
                println!("  ⚠️  No config file, using defaults — run `mailwright onboard`");
            }
            config
        }
        Err(e) => {
            println!("  ❌ Config file invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    // API key (length only, never the key)
    println!("  Provider:          {} ({})", config.provider, config.effective_model());
    match config.api_key() {
        Some(key) => println!("  ✅ API key found (length: {})", key.len()),
        None if needs_no_key(&config.provider) => {
            println!("  ✅ Local provider, no API key needed");
        }
        None => {
            println!(
                "  ❌ No API key — set {} or api_key in the config file",
                key_env_vars(&config.provider).join(" / ")
            );
            issues += 1;
        }
    }

    // Model reachability
    match build_provider(&config) {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ {} API reachable", provider.name()),
            Ok(false) => {
                println!("  ❌ {} API rejected the request (check the API key)", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ {} API unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        None => println!("  ⏭️  Model check skipped (no provider configured)"),
    }

    // Gmail client credentials
    match ClientSecrets::load(&config.mail.credentials_path) {
        Ok(secrets) => println!(
            "  ✅ OAuth client found ({})",
            secrets.client_id.split('.').next().unwrap_or_default()
        ),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    // Cached token
    let store = TokenStore::new(&config.mail.token_path);
    match store.load() {
        Ok(Some(token)) if token.is_valid() => println!("  ✅ Gmail token valid"),
        Ok(Some(token)) if token.can_refresh() => {
            println!("  ✅ Gmail token expired, will refresh on next send");
        }
        Ok(Some(_)) => {
            println!("  ❌ Gmail token expired and cannot refresh — run `mailwright auth`");
            issues += 1;
        }
        Ok(None) => {
            println!("  ⚠️  No Gmail token at {} — run `mailwright auth`", store.path().display());
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Gmail token unreadable: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
