//! The dispatch loop implementation.

use std::path::PathBuf;
use std::sync::Arc;
use futures::future::join_all;
use mailwright_config::{LOCAL_CONFIG_FILE, key_env_vars};
use mailwright_core::{ChatRequest, Error, MailSender, OutgoingEmail, SendOutcome};
use mailwright_providers::ModelSlot;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;
use crate::formatter::format_prompt;
use crate::parser::{Parsed, parse_response};
use crate::schema::{SYSTEM_PROMPT, SendAction};
use crate::summary::{MISSING_INFO_MESSAGE, summarize};

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// The model's text was returned unchanged.
    NoAction,
    /// No model is bound.
    ModelUnavailable,
    /// The model call failed.
    ModelFailed,
    /// An action was found but could not be dispatched.
    ValidationFailed,
    /// Sends were attempted.
    Dispatched { attempted: usize, succeeded: usize },
}

/// The single reply a turn produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    pub kind: TurnKind,
}

impl TurnReply {
    fn new(text: impl Into<String>, kind: TurnKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Drives one turn: prompt, model call, parse, validate, send, summarize.
///
/// Holds no per-turn state, so one instance serves any number of concurrent
/// requests.
pub struct DispatchLoop {
    model: Arc<ModelSlot>,
    sender: Arc<dyn MailSender>,
    system_prompt: String,
    config_path: PathBuf,
}

impl DispatchLoop {
    pub fn new(model: Arc<ModelSlot>, sender: Arc<dyn MailSender>) -> Self {
        Self {
            model,
            sender,
            system_prompt: SYSTEM_PROMPT.to_string(),
            config_path: PathBuf::from(LOCAL_CONFIG_FILE),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// The config file named in the "no API key" reply.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn model(&self) -> &Arc<ModelSlot> {
        &self.model
    }

    /// Process one request and produce its reply.
    ///
    /// Model and parse failures become reply text. `Err` is reserved for
    /// internal faults, such as a send task that panicked.
    pub async fn process(&self, request: &ChatRequest) -> Result<TurnReply, Error> {
        let turn_id = Uuid::new_v4();
        let span = info_span!("turn", turn_id = %turn_id);
        self.run_turn(request).instrument(span).await
    }

    async fn run_turn(&self, request: &ChatRequest) -> Result<TurnReply, Error> {
        info!(
            history = request.history.len(),
            recipients = request.recipients().len(),
            "Processing message"
        );

        let (provider, binding) = self.model.snapshot();
        let Some(binding) = binding else {
            warn!(provider = %provider, "No model bound");
            return Ok(TurnReply::new(
                self.unavailable_message(&provider),
                TurnKind::ModelUnavailable,
            ));
        };

        let prompt = format_prompt(&self.system_prompt, request);
        debug!(prompt_len = prompt.len(), model = %binding.model, "Sending prompt");

        let response = match binding.provider.complete(binding.request(prompt)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = %binding.provider.name(), error = %e, "Model call failed");
                return Ok(TurnReply::new(
                    format!(
                        "An error occurred processing your request with {}: {e}",
                        binding.provider.name()
                    ),
                    TurnKind::ModelFailed,
                ));
            }
        };
        let text = response.text;
        debug!(reply_len = text.len(), "Model responded");

        let parsed = match parse_response(&text) {
            Ok(Parsed::Action(parsed)) => parsed,
            Ok(Parsed::NoAction) => return Ok(TurnReply::new(text, TurnKind::NoAction)),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed action block");
                return Ok(TurnReply::new(text, TurnKind::NoAction));
            }
        };

        let action = match SendAction::resolve(parsed, request.recipients()) {
            Ok(action) => action,
            Err(e) => {
                info!(reason = %e, "Action failed validation; nothing sent");
                return Ok(TurnReply::new(MISSING_INFO_MESSAGE, TurnKind::ValidationFailed));
            }
        };

        let outcomes = self.dispatch(&action).await?;
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        info!(attempted = outcomes.len(), succeeded, "Dispatch finished");

        Ok(TurnReply::new(
            summarize(&outcomes),
            TurnKind::Dispatched {
                attempted: outcomes.len(),
                succeeded,
            },
        ))
    }

    /// Send to every address concurrently.
    ///
    /// Each send runs as its own task, so sends already started finish even
    /// if the caller stops waiting.
    async fn dispatch(&self, action: &SendAction) -> Result<Vec<SendOutcome>, Error> {
        let tasks = action.to_addresses().iter().map(|address| {
            let sender = Arc::clone(&self.sender);
            let email = OutgoingEmail::new(address.as_str(), action.subject(), action.body());
            tokio::spawn(
                async move {
                    match sender.send(&email).await {
                        Ok(sent) => {
                            debug!(to = %email.to, message_id = ?sent.id, "Send succeeded");
                            SendOutcome::succeeded(email.to)
                        }
                        Err(e) => {
                            warn!(to = %email.to, error = %e, "Send failed");
                            SendOutcome::failed(email.to)
                        }
                    }
                }
                .in_current_span(),
            )
        });

        join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.map_err(|e| Error::Internal(format!("send task failed: {e}"))))
            .collect()
    }

    fn unavailable_message(&self, provider: &str) -> String {
        format!(
            "ERROR: No API key configured for provider '{provider}'. Set {} or api_key in {}.",
            key_env_vars(provider).join(" or "),
            self.config_path.display()
        )
    }
}
