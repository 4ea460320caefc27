//! `mailwright auth`: Authorize the Gmail account.

use mailwright_config::AppConfig;
use mailwright_mail::GmailAuth;

pub async fn run(status_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let auth = GmailAuth::new(&config.mail);

    if status_only {
        print_status(&auth).await;
        return Ok(());
    }

    if !config.mail.credentials_path.exists() && !auth.status().await.authenticated {
        eprintln!();
        eprintln!("  ERROR: No OAuth client credentials found!");
        eprintln!();
        eprintln!("  Download an OAuth client (type \"Desktop app\") from the Google Cloud");
        eprintln!("  console and save it as:");
        eprintln!("    {}", config.mail.credentials_path.display());
        eprintln!();
        return Err("credentials file missing".into());
    }

    println!("✉️  Mailwright — Gmail Authorization");
    println!("===================================\n");

    auth.authorize_with(|url| {
        println!("  Open this URL in your browser and grant access:\n");
        println!("    {url}\n");
        println!("  Waiting for the redirect (2 minutes)...");
    })
    .await
    .map_err(|e| format!("Authorization failed: {e}"))?;

    println!("\n  ✅ Gmail authorized. Token saved to {}", config.mail.token_path.display());
    Ok(())
}

async fn print_status(auth: &GmailAuth) {
    let status = auth.status().await;
    println!("✉️  Gmail Authorization");
    println!("=====================");
    println!("  Authenticated:   {}", if status.authenticated { "yes" } else { "no" });
    println!("  Refresh token:   {}", if status.has_refresh_token { "yes" } else { "no" });
    match status.expiry {
        Some(expiry) => println!("  Access expires:  {}", expiry.to_rfc3339()),
        None => println!("  Access expires:  unknown"),
    }
    println!("  Token file:      {}", status.token_path);
    println!(
        "  Credentials:     {}",
        if status.credentials_present { "present" } else { "missing" }
    );
}
