//! Shared test doubles for the dispatch loop.

use std::collections::HashSet;
use std::sync::Mutex;
use async_trait::async_trait;
use mailwright_core::error::{MailError, ProviderError};
use mailwright_core::{MailSender, OutgoingEmail, Provider, ProviderRequest, ProviderResponse, SentMessage};

/// Returns scripted replies in order and records every prompt it saw.
///
/// Panics if called more times than it has replies.
pub struct ScriptedProvider {
    replies: Vec<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn text(reply: &str) -> Self {
        Self::new(vec![reply.to_string()])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut prompts = self.prompts.lock().unwrap();
        let Some(reply) = self.replies.get(prompts.len()) else {
            panic!(
                "ScriptedProvider: no more replies (call #{}, have {})",
                prompts.len(),
                self.replies.len()
            );
        };
        prompts.push(request.prompt);
        Ok(ProviderResponse {
            text: reply.clone(),
            model: request.model,
            usage: None,
        })
    }
}

/// Always fails with a network error.
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("boom".into()))
    }
}

/// Records every message and fails for addresses on its fail list.
#[derive(Default)]
pub struct RecordingMailSender {
    fail: HashSet<String>,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing<I: IntoIterator<Item = &'static str>>(addresses: I) -> Self {
        Self {
            fail: addresses.into_iter().map(str::to_string).collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Every attempted message, in completion order.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.sent().into_iter().map(|e| e.to).collect()
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SentMessage, MailError> {
        self.sent.lock().unwrap().push(email.clone());
        if self.fail.contains(&email.to) {
            return Err(MailError::Api {
                status_code: 500,
                message: "scripted failure".into(),
            });
        }
        Ok(SentMessage {
            id: Some(format!("msg-{}", email.to)),
        })
    }
}

/// Panics on every send.
pub struct PanickingMailSender;

#[async_trait]
impl MailSender for PanickingMailSender {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn send(&self, _email: &OutgoingEmail) -> Result<SentMessage, MailError> {
        panic!("sender crashed");
    }
}

/// A model reply carrying a `send_email` block.
pub fn action_reply(to: &str, subject: &str, body: &str) -> String {
    let block = serde_json::json!({
        "action": "send_email",
        "parameters": {"to_email": to, "subject": subject, "body": body}
    });
    format!("I'll send that now.\n```json\n{block:#}\n```")
}
