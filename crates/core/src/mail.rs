//! MailSender trait: the abstraction over the mail provider.
//!
//! A sender delivers one message to one address. Authentication and
//! credential refresh are entirely the implementation's concern; callers only
//! learn whether each send succeeded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::MailError;

/// A single message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// What the provider reported back for a delivered message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentMessage {
    /// Provider-assigned message ID, when one was returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// The result of one attempted send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub address: String,
    pub success: bool,
}

impl SendOutcome {
    pub fn succeeded(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            success: true,
        }
    }

    pub fn failed(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            success: false,
        }
    }
}

/// The core MailSender trait.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// A human-readable name for this sender (e.g., "gmail").
    fn name(&self) -> &str;

    /// Deliver one message.
    async fn send(&self, email: &OutgoingEmail) -> std::result::Result<SentMessage, MailError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Accepts everything except addresses on the reject list.
    struct PickySender {
        reject: Vec<String>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MailSender for PickySender {
        fn name(&self) -> &str {
            "picky"
        }

        async fn send(&self, email: &OutgoingEmail) -> std::result::Result<SentMessage, MailError> {
            self.seen.lock().unwrap().push(email.to.clone());
            if self.reject.contains(&email.to) {
                return Err(MailError::Api {
                    status_code: 400,
                    message: "rejected".into(),
                });
            }
            Ok(SentMessage { id: Some("m-1".into()) })
        }
    }

    #[tokio::test]
    async fn sender_reports_per_address() {
        let sender = PickySender {
            reject: vec!["bad@x.com".into()],
            seen: Mutex::new(Vec::new()),
        };

        let ok = sender.send(&OutgoingEmail::new("a@x.com", "s", "b")).await;
        let err = sender.send(&OutgoingEmail::new("bad@x.com", "s", "b")).await;

        assert_eq!(ok.unwrap().id.as_deref(), Some("m-1"));
        assert!(matches!(err, Err(MailError::Api { status_code: 400, .. })));
        assert_eq!(*sender.seen.lock().unwrap(), ["a@x.com", "bad@x.com"]);
    }

    #[test]
    fn outcome_constructors() {
        assert!(SendOutcome::succeeded("a@x.com").success);
        assert!(!SendOutcome::failed("a@x.com").success);
    }
}
