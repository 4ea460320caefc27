//! Error types for the Mailwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator has its own error enum; the top-level [`Error`] wraps them.

use thiserror::Error;

/// The top-level error type for all Mailwright operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Mail errors ---
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Model returned no text")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("OAuth client credentials not found at {0}")]
    CredentialsMissing(String),

    #[error("Invalid credentials file: {0}")]
    InvalidCredentials(String),

    #[error("Mail account is not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Mail API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
