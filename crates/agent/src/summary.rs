//! Reply text for the end of a turn.

use mailwright_core::SendOutcome;

/// Reply when a parsed action is missing a recipient, subject or body.
pub const MISSING_INFO_MESSAGE: &str =
    "Missing required information. Please provide subject and body for the email.";

/// Reply when every send failed.
pub const ALL_FAILED_MESSAGE: &str =
    "Failed to send email to all recipients. Please check server logs.";

/// Summarize the outcomes of one dispatch.
///
/// Depends only on which addresses succeeded and which failed. Addresses are
/// listed in the order given.
pub fn summarize(outcomes: &[SendOutcome]) -> String {
    let succeeded = outcomes.iter().filter(|o| o.success).count();

    if succeeded == outcomes.len() {
        let all: Vec<&str> = outcomes.iter().map(|o| o.address.as_str()).collect();
        format!(
            "Email sent successfully to {succeeded} recipient(s): {}!",
            all.join(", ")
        )
    } else if succeeded > 0 {
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.address.as_str())
            .collect();
        format!(
            "Email sent to {succeeded} recipient(s). Failed to send to: {}",
            failed.join(", ")
        )
    } else {
        ALL_FAILED_MESSAGE.to_string()
    }
}
