//! Renders one turn into the single prompt string the model sees.

use mailwright_core::{ChatRequest, ConversationTurn};

/// The cue that tells the model it speaks next.
pub const RESPONSE_CUE: &str = "AGENT:";

/// Build the prompt for `request`.
///
/// History is passed through whole; nothing is truncated.
pub fn format_prompt(system_prompt: &str, request: &ChatRequest) -> String {
    let mut prompt = String::with_capacity(
        system_prompt.len()
            + request.message.len()
            + request.history.iter().map(|t| t.content.len() + 8).sum::<usize>()
            + 128,
    );

    prompt.push_str(system_prompt);
    prompt.push_str("\n\nConversation History:\n");

    let recipients: Vec<&str> = request
        .recipients()
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect();
    if !recipients.is_empty() {
        prompt.push_str(&format!("\nRECIPIENTS LIST: {}\n", recipients.join(", ")));
        prompt.push_str("Note: When sending an email, send it to ALL recipients in the list above.\n\n");
    }

    for turn in &request.history {
        push_turn(&mut prompt, turn);
    }

    prompt.push_str(&format!("\nUSER: {}\n", request.message));
    prompt.push_str(RESPONSE_CUE);
    prompt
}

fn push_turn(prompt: &mut String, turn: &ConversationTurn) {
    prompt.push_str(turn.role.label());
    prompt.push_str(": ");
    prompt.push_str(&turn.content);
    prompt.push('\n');
}
