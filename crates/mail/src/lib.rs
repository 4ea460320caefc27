//! Mail delivery for Mailwright.
//!
//! Sends through the Gmail REST API with an OAuth2 "installed app"
//! credential:
//! - [`credentials`]: `credentials.json` client secrets and the cached `token.json`
//! - [`oauth`]: token refresh, code exchange and the loopback authorization flow
//! - [`auth`]: [`GmailAuth`], which owns the credential state
//! - [`gmail`]: [`GmailSender`], the `MailSender` implementation

pub mod auth;
pub mod credentials;
pub mod gmail;
pub mod oauth;

pub use auth::{AuthStatus, Authenticator, GmailAuth};
pub use credentials::{ClientSecrets, StoredToken, TokenStore};
pub use gmail::GmailSender;
pub use oauth::GoogleOAuth;

/// OAuth scope needed to send mail.
pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";
