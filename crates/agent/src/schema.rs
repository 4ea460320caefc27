//! The one action the agent knows: `send_email`.

use thiserror::Error;

/// Name of the only recognized action.
pub const SEND_EMAIL_ACTION: &str = "send_email";

/// Parameters a `send_email` action must carry.
pub const REQUIRED_PARAMETERS: [&str; 3] = ["to_email", "subject", "body"];

/// Fixed instructions placed at the top of every prompt.
pub const SYSTEM_PROMPT: &str = r#"
You are an intelligent Email Agent. Your goal is to help users draft and send emails.
You will receive a user request and conversation history.

You have access to a tool called 'send_email'.
If the user asks to send an email, you MUST extract the recipient (to_email), subject, and body.
If any information is missing, ask the user for it.
Once you have all the details, you should output a JSON object in this specific format to trigger the action:

```json
{
    "action": "send_email",
    "parameters": {
        "to_email": "recipient@example.com",
        "subject": "Email Subject",
        "body": "Email Body"
    }
}
```

If you are not sending an email, just reply normally.
Always be polite, professional, and helpful.
Do not hallucinate sending the email if you haven't produced the JSON action.
"#;

/// A `send_email` block as the model wrote it. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAction {
    pub to_email: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// Why a parsed action cannot be dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no recipient address")]
    NoRecipients,
    #[error("subject is empty")]
    EmptySubject,
    #[error("body is empty")]
    EmptyBody,
}

/// A validated, ready-to-dispatch send.
///
/// Only [`SendAction::resolve`] builds one, so holding a `SendAction` means
/// every address, the subject and the body are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendAction {
    to_addresses: Vec<String>,
    subject: String,
    body: String,
}

impl SendAction {
    /// Resolve the target addresses and check the required fields.
    ///
    /// A non-empty `recipients` override wins over the model's `to_email`.
    /// Override entries are trimmed, blank entries dropped and duplicates
    /// removed (first occurrence kept). This mirrors the trimming and
    /// de-duplication the web client applies to its recipient list before
    /// posting, so callers that skip the client (CLI, direct HTTP) get the
    /// same targets. An override that is blank after trimming counts as
    /// absent.
    pub fn resolve(parsed: ParsedAction, recipients: &[String]) -> Result<Self, ValidationError> {
        let mut to_addresses: Vec<String> = Vec::new();
        for address in recipients.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            if !to_addresses.iter().any(|a| a == address) {
                to_addresses.push(address.to_string());
            }
        }

        if to_addresses.is_empty() {
            if let Some(to) = parsed.to_email.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                to_addresses.push(to.to_string());
            }
        }

        if to_addresses.is_empty() {
            return Err(ValidationError::NoRecipients);
        }

        let subject = parsed.subject.filter(|s| !s.is_empty()).ok_or(ValidationError::EmptySubject)?;
        let body = parsed.body.filter(|b| !b.is_empty()).ok_or(ValidationError::EmptyBody)?;

        Ok(Self {
            to_addresses,
            subject,
            body,
        })
    }

    pub fn to_addresses(&self) -> &[String] {
        &self.to_addresses
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
