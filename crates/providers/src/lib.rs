//! Language model provider implementations for Mailwright.
//!
//! All providers implement the `mailwright_core::Provider` trait.
//! [`router::build_provider`] picks one from configuration and
//! [`ModelSlot`] holds the current binding so it can be re-resolved.

pub mod gemini;
pub mod openai_compat;
pub mod router;
pub mod slot;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_provider, needs_no_key};
pub use slot::{ModelBinding, ModelSlot};
