//! On-disk OAuth material.
//!
//! `credentials.json` is the client secrets file downloaded from the Google
//! Cloud console. `token.json` caches the authorized user's tokens in the
//! same layout Google's own client libraries write, so an existing file can
//! be reused as-is.

use std::path::{Path, PathBuf};
use chrono::{DateTime, Duration, Utc};
use mailwright_core::MailError;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Treat tokens this close to expiry as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth client identity from `credentials.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.into()
}
fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.into()
}

/// The file wraps the client in an `installed` or `web` section.
#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse the contents of a `credentials.json` file.
    pub fn parse(content: &str) -> Result<Self, MailError> {
        let file: ClientSecretsFile = serde_json::from_str(content)
            .map_err(|e| MailError::InvalidCredentials(format!("credentials file: {e}")))?;
        file.installed.or(file.web).ok_or_else(|| {
            MailError::InvalidCredentials(
                "credentials file has neither an \"installed\" nor a \"web\" client".into(),
            )
        })
    }

    /// Read client secrets from disk.
    pub fn load(path: &Path) -> Result<Self, MailError> {
        if !path.exists() {
            return Err(MailError::CredentialsMissing(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// The authorized user's tokens, as cached in `token.json`.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// The current access token
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("token", &"[REDACTED]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl StoredToken {
    /// Whether the access token has passed (or is about to pass) its expiry.
    /// Tokens without an expiry are assumed current.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Usable as-is for an API call.
    pub fn is_valid(&self) -> bool {
        !self.token.is_empty() && !self.is_expired()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Loads and saves `token.json`.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached token. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<StoredToken>, MailError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No cached token");
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let token = serde_json::from_str(&content)
            .map_err(|e| MailError::InvalidCredentials(format!("token file: {e}")))?;
        Ok(Some(token))
    }

    /// Persist the token, creating parent directories as needed.
    pub fn save(&self, token: &StoredToken) -> Result<(), MailError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| MailError::InvalidCredentials(format!("token file: {e}")))?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "Saved token");
        Ok(())
    }
}
