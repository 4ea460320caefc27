//! Finds the action block in a model reply.
//!
//! The block is the text between the first ```` ```json ```` fence and the
//! next closing fence. Anything that is not a well-formed `send_email`
//! object leaves the reply as plain text.

use serde_json::Value;
use thiserror::Error;
use crate::schema::{ParsedAction, SEND_EMAIL_ACTION};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// What the parser found in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// A plain reply, shown to the user as-is.
    NoAction,
    /// A `send_email` block, not yet validated.
    Action(ParsedAction),
}

/// The fenced block was not a JSON object.
#[derive(Debug, Error)]
#[error("malformed action block: {0}")]
pub struct MalformedAction(String);

/// The raw text inside the first JSON fence, trimmed.
///
/// An unterminated fence runs to the end of the text.
pub fn extract_block(text: &str) -> Option<&str> {
    let start = text.find(JSON_FENCE)? + JSON_FENCE.len();
    let rest = &text[start..];
    let end = rest.find(FENCE).unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Parse a model reply.
pub fn parse_response(text: &str) -> Result<Parsed, MalformedAction> {
    let Some(block) = extract_block(text) else {
        return Ok(Parsed::NoAction);
    };

    let value: Value = serde_json::from_str(block).map_err(|e| MalformedAction(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(MalformedAction("expected a JSON object".into()));
    };

    if object.get("action").and_then(Value::as_str) != Some(SEND_EMAIL_ACTION) {
        return Ok(Parsed::NoAction);
    }

    let params = object.get("parameters");
    let field = |name: &str| {
        params
            .and_then(|p| p.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Ok(Parsed::Action(ParsedAction {
        to_email: field("to_email"),
        subject: field("subject"),
        body: field("body"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "Sure, sending now.\n```json\n{\n  \"action\": \"send_email\",\n  \"parameters\": {\"to_email\": \"a@x.com\", \"subject\": \"hello\", \"body\": \"hi\"}\n}\n```\nDone.";

    #[test]
    fn plain_text_is_no_action() {
        assert_eq!(parse_response("Who should I send it to?").unwrap(), Parsed::NoAction);
    }

    #[test]
    fn unlabelled_fence_is_no_action() {
        let text = "```\n{\"action\": \"send_email\"}\n```";
        assert_eq!(parse_response(text).unwrap(), Parsed::NoAction);
    }

    #[test]
    fn valid_block() {
        assert_eq!(
            parse_response(VALID).unwrap(),
            Parsed::Action(ParsedAction {
                to_email: Some("a@x.com".into()),
                subject: Some("hello".into()),
                body: Some("hi".into()),
            })
        );
    }

    #[test]
    fn only_first_block_counts() {
        let text = format!("{VALID}\n```json\n{{\"action\": \"send_email\", \"parameters\": {{\"to_email\": \"b@x.com\"}}}}\n```");
        let Parsed::Action(action) = parse_response(&text).unwrap() else {
            panic!("expected an action");
        };
        assert_eq!(action.to_email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn unterminated_fence_reads_to_end() {
        let text = "```json\n{\"action\": \"send_email\", \"parameters\": {\"subject\": \"s\"}}";
        let Parsed::Action(action) = parse_response(text).unwrap() else {
            panic!("expected an action");
        };
        assert_eq!(action.subject.as_deref(), Some("s"));
        assert!(action.to_email.is_none());
    }

    #[test]
    fn other_action_is_no_action() {
        let text = "```json\n{\"action\": \"schedule_meeting\", \"parameters\": {}}\n```";
        assert_eq!(parse_response(text).unwrap(), Parsed::NoAction);
    }

    #[test]
    fn missing_parameters_object() {
        let text = "```json\n{\"action\": \"send_email\"}\n```";
        assert_eq!(parse_response(text).unwrap(), Parsed::Action(ParsedAction::default()));
    }

    #[test]
    fn non_string_parameters_are_absent() {
        let text = "```json\n{\"action\": \"send_email\", \"parameters\": {\"to_email\": [\"a@x.com\"], \"subject\": 5, \"body\": \"b\"}}\n```";
        let Parsed::Action(action) = parse_response(text).unwrap() else {
            panic!("expected an action");
        };
        assert!(action.to_email.is_none());
        assert!(action.subject.is_none());
        assert_eq!(action.body.as_deref(), Some("b"));
    }

    #[test]
    fn malformed_json() {
        assert!(parse_response("```json\n{\"action\": \"send_email\",\n```").is_err());
        assert!(parse_response("```json\n```").is_err());
    }

    #[test]
    fn non_object_json_is_malformed() {
        assert!(parse_response("```json\n[1, 2]\n```").is_err());
        assert!(parse_response("```json\n\"send_email\"\n```").is_err());
    }
}
