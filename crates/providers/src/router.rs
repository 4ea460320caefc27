//! Provider selection. Builds the configured model backend.

use std::sync::Arc;
use mailwright_config::AppConfig;
use mailwright_core::provider::Provider;
use tracing::{info, warn};
use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the provider named by `config.provider`.
///
/// Returns `None` when the provider needs an API key and none is
/// configured; the caller reports that as "model unavailable".
pub fn build_provider(config: &AppConfig) -> Option<Arc<dyn Provider>> {
    let name = config.provider.as_str();
    let api_url = config.provider_config().and_then(|p| p.api_url.clone());

    let Some(api_key) = config.api_key().map(str::to_string).or_else(|| {
        // Local endpoints run without a key
        needs_no_key(name).then(String::new)
    }) else {
        warn!(provider = %name, "No API key configured; model calls are unavailable");
        return None;
    };

    info!(provider = %name, key_len = api_key.len(), "Initializing model provider");

    let provider: Arc<dyn Provider> = match name {
        "gemini" | "google" => {
            let mut p = GeminiProvider::new(api_key);
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        "ollama" if api_key.is_empty() => {
            Arc::new(OpenAiCompatProvider::ollama(api_url.as_deref()))
        }
        _ => {
            let base_url = api_url.unwrap_or_else(|| default_base_url(name));
            Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
        }
    };

    Some(provider)
}

/// Whether the named provider is a local endpoint that runs without a key.
pub fn needs_no_key(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
