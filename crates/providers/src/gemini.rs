//! Google Gemini provider implementation.
//!
//! Uses the Generative Language REST API (`models/{model}:generateContent`)
//! directly:
//! - `x-goog-api-key` header authentication
//! - the whole prompt is sent as a single user `contents` entry
//! - text parts of the first candidate are concatenated into the reply

use async_trait::async_trait;
use mailwright_core::error::ProviderError;
use mailwright_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn build_body(request: &ProviderRequest) -> ApiRequest {
        ApiRequest {
            contents: vec![ApiContent {
                role: "user".into(),
                parts: vec![ApiPart {
                    text: Some(request.prompt.clone()),
                }],
            }],
            generation_config: ApiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(response: &ApiResponse) -> Option<String> {
        let candidate = response.candidates.first()?;
        let content = candidate.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }
}

#[async_trait]
impl mailwright_core::Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = self.endpoint(&request.model);
        let body = Self::build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            prompt_len = request.prompt.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: status,
                message: format!("Failed to parse response: {e}"),
            })?;

        let text = Self::extract_text(&api_response).ok_or(ProviderError::EmptyResponse)?;

        let usage = api_response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ProviderResponse {
            text,
            model: api_response.model_version.unwrap_or(request.model),
            usage,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsage>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailwright_core::Provider;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Answer every request on a loopback port with a fixed status and body.
    /// Returns the base URL and the raw requests received.
    async fn stub_server(status: u16, body: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/v1beta", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let request = read_request(&mut stream).await;
                log.lock().unwrap().push(request);
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (base, seen)
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    async fn complete_against(status: u16, body: &'static str) -> Result<ProviderResponse, ProviderError> {
        let (base, _) = stub_server(status, body).await;
        GeminiProvider::new("g-key")
            .with_base_url(base)
            .complete(ProviderRequest::new("gemini-flash-latest", "USER: hi\nAGENT:"))
            .await
    }

    #[test]
    fn default_constructor() {
        let provider = GeminiProvider::new("g-test");
        assert_eq!(provider.name(), "gemini");
        assert!(provider.base_url.contains("generativelanguage.googleapis.com"));
    }

    #[test]
    fn endpoint_accepts_prefixed_model_names() {
        let provider = GeminiProvider::new("k").with_base_url("http://localhost:9999/v1beta/");
        assert_eq!(
            provider.endpoint("gemini-flash-latest"),
            "http://localhost:9999/v1beta/models/gemini-flash-latest:generateContent"
        );
        assert_eq!(
            provider.endpoint("models/gemini-flash-latest"),
            "http://localhost:9999/v1beta/models/gemini-flash-latest:generateContent"
        );
    }

    #[test]
    fn request_body_shape() {
        let mut request = ProviderRequest::new("gemini-flash-latest", "USER: hi\nAGENT:");
        request.max_tokens = Some(256);
        let body = serde_json::to_value(GeminiProvider::build_body(&request)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "USER: hi\nAGENT:");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
        assert!(body["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn max_tokens_omitted_when_unset() {
        let request = ProviderRequest::new("m", "p");
        let body = serde_json::to_value(GeminiProvider::build_body(&request)).unwrap();
        assert!(body["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn parse_response_joins_text_parts() {
        let data = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Sure, "}, {"text": "who to?"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4, "totalTokenCount": 16},
            "modelVersion": "gemini-2.5-flash"
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(
            GeminiProvider::extract_text(&parsed).as_deref(),
            Some("Sure, who to?")
        );
        let usage = parsed.usage_metadata.unwrap();
        assert_eq!(usage.total_token_count, 16);
        assert_eq!(parsed.model_version.as_deref(), Some("gemini-2.5-flash"));
    }

    #[test]
    fn blocked_prompt_has_no_text() {
        let data = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(GeminiProvider::extract_text(&parsed).is_none());
    }

    #[test]
    fn candidate_without_content_has_no_text() {
        let data = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(GeminiProvider::extract_text(&parsed).is_none());
    }

    #[tokio::test]
    async fn complete_posts_prompt_and_returns_text() {
        let (base, seen) = stub_server(
            200,
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Who should I email?"}]}}],
                "usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":4,"totalTokenCount":9}}"#,
        )
        .await;
        let response = GeminiProvider::new("g-key")
            .with_base_url(base)
            .complete(ProviderRequest::new("gemini-flash-latest", "USER: hi\nAGENT:"))
            .await
            .unwrap();

        assert_eq!(response.text, "Who should I email?");
        assert_eq!(response.model, "gemini-flash-latest");
        assert_eq!(response.usage.unwrap().total_tokens, 9);

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("POST /v1beta/models/gemini-flash-latest:generateContent"));
        assert!(requests[0].to_lowercase().contains("x-goog-api-key: g-key"));
        assert!(requests[0].contains("USER: hi\\nAGENT:"));
    }

    #[tokio::test]
    async fn rate_limit_status_maps_to_rate_limited() {
        let err = complete_against(429, r#"{"error":{"code":429}}"#).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn auth_statuses_map_to_authentication_failed() {
        for status in [401, 403] {
            let err = complete_against(status, r#"{"error":{"code":403}}"#).await.unwrap_err();
            assert!(matches!(err, ProviderError::AuthenticationFailed(_)), "status {status}");
        }
    }

    #[tokio::test]
    async fn other_error_status_maps_to_api_error() {
        let err = complete_against(500, r#"{"error":{"message":"backend down"}}"#)
            .await
            .unwrap_err();
        match err {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 500);
                assert!(message.contains("backend down"));
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_candidates_maps_to_empty_response() {
        let err = complete_against(200, r#"{"candidates":[]}"#).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = GeminiProvider::new("g-key")
            .with_base_url(format!("http://{addr}/v1beta"))
            .complete(ProviderRequest::new("m", "p"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }

    #[tokio::test]
    async fn health_check_lists_models() {
        let (base, seen) = stub_server(200, r#"{"models":[]}"#).await;
        let provider = GeminiProvider::new("g-key").with_base_url(base);
        assert!(provider.health_check().await.unwrap());
        assert!(seen.lock().unwrap()[0].starts_with("GET /v1beta/models "));

        let (base, _) = stub_server(403, r#"{"error":{}}"#).await;
        let provider = GeminiProvider::new("bad-key").with_base_url(base);
        assert!(!provider.health_check().await.unwrap());
    }
}
