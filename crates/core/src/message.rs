//! Conversation domain types.
//!
//! These are the value objects that flow through a single turn:
//! the caller sends a [`ChatRequest`] → the agent renders its history into a
//! prompt → the model answers → the agent replies with one string.
//!
//! History is caller-supplied on every request; nothing here is persisted.

use serde::{Deserialize, Deserializer, Serialize};

/// Who authored a turn in the conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    #[default]
    User,
    /// The email agent (the model's earlier replies)
    Agent,
}

impl Role {
    /// Parse a role name leniently.
    ///
    /// `agent`, `assistant` and `model` name the agent; every other value,
    /// including the empty string, falls back to [`Role::User`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "agent" | "assistant" | "model" => Role::Agent,
            _ => Role::User,
        }
    }

    /// The upper-case label used when rendering a transcript.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Agent => "AGENT",
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Role::from_name).unwrap_or_default())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single prior turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who said it
    #[serde(default)]
    pub role: Role,

    /// The text content
    #[serde(default)]
    pub content: String,
}

impl ConversationTurn {
    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an agent turn.
    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
        }
    }
}

/// One inbound request: the new message plus everything said before it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The current user message
    pub message: String,

    /// Prior turns, oldest first
    #[serde(default, deserialize_with = "null_as_empty")]
    pub history: Vec<ConversationTurn>,

    /// Explicit recipients that override whatever address the model extracts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<String>>,
}

impl ChatRequest {
    /// Create a request with no history and no recipient override.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            recipients: None,
        }
    }

    /// Attach prior turns.
    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    /// Attach a recipient override list.
    pub fn with_recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients = Some(recipients.into_iter().map(Into::into).collect());
        self
    }

    /// The recipient override as a slice (empty when absent).
    pub fn recipients(&self) -> &[String] {
        self.recipients.as_deref().unwrap_or_default()
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<ConversationTurn>, D::Error> {
    Ok(Option::<Vec<ConversationTurn>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_defaults_to_user() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role": "system", "content": "hi"}"#).unwrap();
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "hi");
    }

    #[test]
    fn assistant_aliases_map_to_agent() {
        for name in ["agent", "assistant", "Model", " ASSISTANT "] {
            assert_eq!(Role::from_name(name), Role::Agent, "{name}");
        }
    }

    #[test]
    fn missing_role_and_content_default() {
        let turn: ConversationTurn = serde_json::from_str("{}").unwrap();
        assert_eq!(turn.role, Role::User);
        assert!(turn.content.is_empty());

        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role": null, "content": "x"}"#).unwrap();
        assert_eq!(turn.role, Role::User);
    }

    #[test]
    fn chat_request_minimal_body() {
        let req: ChatRequest = serde_json::from_str(r#"{"message": "hello"}"#).unwrap();
        assert_eq!(req.message, "hello");
        assert!(req.history.is_empty());
        assert!(req.recipients().is_empty());
    }

    #[test]
    fn chat_request_null_history() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"message": "hello", "history": null, "recipients": null}"#)
                .unwrap();
        assert!(req.history.is_empty());
        assert!(req.recipients.is_none());
    }

    #[test]
    fn chat_request_preserves_history_order() {
        let req: ChatRequest = serde_json::from_str(
            r#"{
                "message": "and now?",
                "history": [
                    {"role": "user", "content": "first"},
                    {"role": "assistant", "content": "second"},
                    {"role": "user", "content": "third"}
                ],
                "recipients": ["a@x.com"]
            }"#,
        )
        .unwrap();
        let contents: Vec<_> = req.history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
        assert_eq!(req.history[1].role, Role::Agent);
        assert_eq!(req.recipients(), ["a@x.com"]);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ConversationTurn::agent("ok")).unwrap();
        assert!(json.contains(r#""role":"agent""#));
    }
}
