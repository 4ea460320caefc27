//! The Mailwright dispatch loop.
//!
//! One turn runs straight through:
//!
//! 1. **Format** the system prompt, recipients hint, history and new message
//!    into one prompt ([`formatter`])
//! 2. **Ask** the bound model for a reply
//! 3. **Parse** the reply for a fenced `send_email` block ([`parser`])
//! 4. **Validate** it into a [`SendAction`] ([`schema`])
//! 5. **Send** once per target address through the [`MailSender`](mailwright_core::MailSender)
//! 6. **Summarize** the outcomes into one reply string ([`summary`])
//!
//! A reply without an action block is returned unchanged.

pub mod formatter;
pub mod loop_runner;
pub mod parser;
pub mod schema;
pub mod summary;

#[cfg(test)]
mod test_helpers;

pub use formatter::format_prompt;
pub use loop_runner::{DispatchLoop, TurnKind, TurnReply};
pub use parser::{MalformedAction, Parsed, parse_response};
pub use schema::{ParsedAction, SEND_EMAIL_ACTION, SYSTEM_PROMPT, SendAction, ValidationError};
pub use summary::{MISSING_INFO_MESSAGE, summarize};
