//! Gmail REST sender.
//!
//! Each message is rendered as a text/plain RFC 5322 message, base64url
//! encoded and posted to `users/me/messages/send`.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use base64::Engine;
use mail_builder::MessageBuilder;
use mailwright_config::MailConfig;
use mailwright_core::{MailError, MailSender, OutgoingEmail, SentMessage};
use serde::Deserialize;
use tracing::{debug, info, warn};
use crate::auth::GmailAuth;

/// Sends mail as the authorized Gmail account.
pub struct GmailSender {
    auth: Arc<GmailAuth>,
    client: reqwest::Client,
    api_url: String,
    sender: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
}

impl GmailSender {
    pub fn new(auth: Arc<GmailAuth>, config: &MailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            auth,
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            sender: config.sender.clone(),
        }
    }

    /// Render the message and encode it the way the `raw` field expects.
    fn encode(&self, email: &OutgoingEmail) -> Result<String, MailError> {
        if !looks_like_address(&email.to) {
            return Err(MailError::InvalidMessage(format!(
                "invalid recipient address: {:?}",
                email.to
            )));
        }

        let mut builder = MessageBuilder::new()
            .to(email.to.as_str())
            .subject(email.subject.as_str())
            .text_body(email.body.as_str());
        if let Some(from) = self.sender.as_deref() {
            builder = builder.from(from);
        }

        let rendered = builder
            .write_to_string()
            .map_err(|e| MailError::InvalidMessage(e.to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE.encode(rendered.as_bytes()))
    }

    async fn post(&self, raw: &str) -> Result<reqwest::Response, MailError> {
        let token = self.auth.access_token().await?;
        self.client
            .post(format!("{}/users/me/messages/send", self.api_url))
            .bearer_auth(token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| MailError::Network(e.to_string()))
    }
}

#[async_trait]
impl MailSender for GmailSender {
    fn name(&self) -> &str {
        "gmail"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SentMessage, MailError> {
        let raw = self.encode(email)?;
        debug!(to = %email.to, bytes = raw.len(), "Sending Gmail message");

        let mut response = self.post(&raw).await?;
        if response.status().as_u16() == 401 {
            // Revoked or clock-skewed token: refresh once and retry
            self.auth.invalidate().await;
            response = self.post(&raw).await?;
        }

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(to = %email.to, status, "Gmail rejected message");
            return Err(match status {
                401 => MailError::NotAuthenticated(message),
                _ => MailError::Api {
                    status_code: status,
                    message,
                },
            });
        }

        let sent: SendResponse = response
            .json()
            .await
            .unwrap_or(SendResponse { id: None });
        info!(to = %email.to, message_id = ?sent.id, "Email sent");
        Ok(SentMessage { id: sent.id })
    }
}

/// A cheap sanity check; Gmail does the real validation.
fn looks_like_address(address: &str) -> bool {
    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !address.chars().any(|c| c.is_whitespace() || c.is_control())
}
