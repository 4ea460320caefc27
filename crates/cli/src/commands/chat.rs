//! `mailwright chat`: Interactive or single-message chat mode.
//!
//! The REPL keeps the transcript locally and sends it with every turn, the
//! same way the web frontend does.

use std::sync::Arc;
use mailwright_agent::DispatchLoop;
use mailwright_config::AppConfig;
use mailwright_core::{ChatRequest, ConversationTurn};
use mailwright_mail::{GmailAuth, GmailSender};
use mailwright_providers::ModelSlot;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    message: Option<String>,
    recipients: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let model = Arc::new(ModelSlot::from_config(&config));
    let auth = Arc::new(GmailAuth::new(&config.mail));
    let sender = Arc::new(GmailSender::new(auth, &config.mail));
    let agent = DispatchLoop::new(model.clone(), sender)
        .with_config_path(config.source.clone().unwrap_or_else(AppConfig::config_path));

    let with_recipients = |request: ChatRequest| {
        if recipients.is_empty() {
            request
        } else {
            request.with_recipients(recipients.iter().cloned())
        }
    };

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = agent.process(&with_recipients(ChatRequest::new(msg))).await?;
        eprint!("\r              \r");
        println!("{}", reply.text);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║      Mailwright Email Agent — Interactive     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:    {}", config.provider);
    println!("  Model:       {}", config.effective_model());
    if !recipients.is_empty() {
        println!("  Recipients:  {}", recipients.join(", "));
    }
    if !model.is_bound() {
        println!("  ⚠️  No API key configured; run `mailwright doctor`");
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut history: Vec<ConversationTurn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    use std::io::Write;
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }

        let request = with_recipients(ChatRequest::new(line.as_str()).with_history(history.clone()));

        eprint!("  ...");
        match agent.process(&request).await {
            Ok(reply) => {
                eprint!("\r     \r");
                println!();
                for text_line in reply.text.lines() {
                    println!("  Agent > {text_line}");
                }
                println!();
                history.push(ConversationTurn::user(line));
                history.push(ConversationTurn::agent(reply.text));
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}
