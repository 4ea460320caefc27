//! # Mailwright Core
//!
//! Domain types, traits, and error definitions for the Mailwright email agent.
//! This crate has **no framework dependencies**: it defines the conversation
//! model and the two collaborator seams (the language model and the mail
//! sender) that every other crate implements against.
//!
//! Implementations live in their respective crates, so the dispatch loop can
//! be driven by real HTTP clients in production and by scripted doubles in
//! tests.

pub mod error;
pub mod mail;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MailError, ProviderError, Result};
pub use mail::{MailSender, OutgoingEmail, SendOutcome, SentMessage};
pub use message::{ChatRequest, ConversationTurn, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
