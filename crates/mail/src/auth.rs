//! Gmail credential state.
//!
//! [`GmailAuth`] owns the cached token for the lifetime of the process. The
//! sender asks it for an access token before every send; the gateway and the
//! CLI use it to report status and to run the authorization flow.

use std::path::PathBuf;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailwright_config::MailConfig;
use mailwright_core::MailError;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use crate::credentials::{ClientSecrets, StoredToken, TokenStore};
use crate::oauth::GoogleOAuth;

/// A snapshot of the mail account's credential state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    /// A usable or refreshable token is on hand
    pub authenticated: bool,
    pub has_refresh_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    pub token_path: String,
    /// Whether `credentials.json` exists (needed for a fresh authorization)
    pub credentials_present: bool,
}

/// Status and authorization, as seen from the gateway.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn status(&self) -> AuthStatus;

    /// Make sure the account is authorized, running the full flow if needed.
    async fn authorize(&self) -> Result<AuthStatus, MailError>;
}

/// Owns the Gmail OAuth credential.
pub struct GmailAuth {
    credentials_path: PathBuf,
    store: TokenStore,
    token: Mutex<Option<StoredToken>>,
}

impl GmailAuth {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            credentials_path: config.credentials_path.clone(),
            store: TokenStore::new(&config.token_path),
            token: Mutex::new(None),
        }
    }

    /// Start from an already-known token (tests, or a token handed over by
    /// the CLI).
    pub fn with_token(config: &MailConfig, token: StoredToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
            ..Self::new(config)
        }
    }

    /// A currently valid access token, refreshing and persisting it when the
    /// cached one has expired.
    pub async fn access_token(&self) -> Result<String, MailError> {
        let mut guard = self.token.lock().await;
        if guard.is_none() {
            *guard = self.store.load()?;
        }

        let Some(token) = guard.as_ref() else {
            return Err(MailError::NotAuthenticated(format!(
                "no token at {}; run `mailwright auth`",
                self.store.path().display()
            )));
        };

        if token.is_valid() {
            return Ok(token.token.clone());
        }

        if !token.can_refresh() {
            return Err(MailError::NotAuthenticated(
                "token expired and no refresh token is stored; run `mailwright auth`".into(),
            ));
        }

        let refreshed = self.oauth_for(Some(token))?.refresh(token).await?;
        self.store.save(&refreshed)?;
        info!(expiry = ?refreshed.expiry, "Refreshed Gmail access token");
        let access = refreshed.token.clone();
        *guard = Some(refreshed);
        Ok(access)
    }

    /// Forget that the cached access token is good. The next
    /// [`access_token`](Self::access_token) call refreshes it.
    pub async fn invalidate(&self) {
        if let Some(token) = self.token.lock().await.as_mut() {
            token.expiry = Some(Utc::now());
        }
    }

    /// Ensure the account is authorized, calling `on_url` with the consent
    /// page address when a browser round-trip is needed.
    pub async fn authorize_with<F>(&self, on_url: F) -> Result<AuthStatus, MailError>
    where
        F: FnOnce(&str) + Send,
    {
        match self.access_token().await {
            Ok(_) => {
                debug!("Gmail account already authorized");
                return Ok(self.status().await);
            }
            Err(e) => debug!(error = %e, "Existing credential unusable, starting authorization"),
        }

        let oauth = GoogleOAuth::new(ClientSecrets::load(&self.credentials_path)?);
        let flow = oauth.start_flow().await?;
        on_url(&flow.auth_url);

        let token = oauth.complete_flow(flow).await?;
        self.store.save(&token)?;
        info!(path = %self.store.path().display(), "Gmail authorization saved");
        *self.token.lock().await = Some(token);

        Ok(self.status().await)
    }

    pub async fn status(&self) -> AuthStatus {
        let mut guard = self.token.lock().await;
        if guard.is_none() {
            match self.store.load() {
                Ok(token) => *guard = token,
                Err(e) => warn!(error = %e, "Unreadable token file"),
            }
        }

        let token = guard.as_ref();
        AuthStatus {
            authenticated: token.is_some_and(|t| t.is_valid() || t.can_refresh()),
            has_refresh_token: token.is_some_and(StoredToken::can_refresh),
            expiry: token.and_then(|t| t.expiry),
            token_path: self.store.path().display().to_string(),
            credentials_present: self.credentials_path.exists(),
        }
    }

    /// The client identity to refresh with: the one recorded in the token,
    /// otherwise `credentials.json`.
    fn oauth_for(&self, token: Option<&StoredToken>) -> Result<GoogleOAuth, MailError> {
        if let Some(oauth) = token.and_then(GoogleOAuth::from_token) {
            return Ok(oauth);
        }
        Ok(GoogleOAuth::new(ClientSecrets::load(&self.credentials_path)?))
    }
}

#[async_trait]
impl Authenticator for GmailAuth {
    async fn status(&self) -> AuthStatus {
        GmailAuth::status(self).await
    }

    async fn authorize(&self) -> Result<AuthStatus, MailError> {
        self.authorize_with(|url| {
            info!(url = %url, "Open this URL in a browser to authorize Gmail access");
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::GOOGLE_TOKEN_URL;
    use chrono::Duration;

    fn config_in(dir: &std::path::Path) -> MailConfig {
        MailConfig {
            credentials_path: dir.join("credentials.json"),
            token_path: dir.join("token.json"),
            ..MailConfig::default()
        }
    }

    fn token(expiry: Option<DateTime<Utc>>, refresh: Option<&str>) -> StoredToken {
        StoredToken {
            token: "access-1".into(),
            refresh_token: refresh.map(str::to_string),
            token_uri: GOOGLE_TOKEN_URL.into(),
            client_id: Some("cid".into()),
            client_secret: None,
            scopes: vec![crate::GMAIL_SEND_SCOPE.into()],
            expiry,
        }
    }

    #[tokio::test]
    async fn no_token_is_not_authenticated() {
        let dir = tempfile::tempdir().unwrap();
        let auth = GmailAuth::new(&config_in(dir.path()));

        let err = auth.access_token().await.unwrap_err();
        assert!(matches!(err, MailError::NotAuthenticated(_)));

        let status = auth.status().await;
        assert!(!status.authenticated);
        assert!(!status.credentials_present);
        assert!(status.token_path.ends_with("token.json"));
    }

    #[tokio::test]
    async fn valid_token_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        TokenStore::new(&config.token_path)
            .save(&token(Some(Utc::now() + Duration::hours(1)), Some("r")))
            .unwrap();

        let auth = GmailAuth::new(&config);
        assert_eq!(auth.access_token().await.unwrap(), "access-1");

        let status = auth.status().await;
        assert!(status.authenticated);
        assert!(status.has_refresh_token);
        assert!(status.expiry.is_some());
    }

    #[tokio::test]
    async fn expired_without_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let auth = GmailAuth::with_token(&config, token(Some(Utc::now() - Duration::hours(1)), None));

        let err = auth.access_token().await.unwrap_err();
        assert!(matches!(err, MailError::NotAuthenticated(_)));
        assert!(!auth.status().await.authenticated);
    }

    #[tokio::test]
    async fn expired_but_refreshable_counts_as_authenticated() {
        let dir = tempfile::tempdir().unwrap();
        let auth = GmailAuth::with_token(
            &config_in(dir.path()),
            token(Some(Utc::now() - Duration::hours(1)), Some("r")),
        );
        assert!(auth.status().await.authenticated);
    }

    #[tokio::test]
    async fn invalidate_marks_token_expired() {
        let dir = tempfile::tempdir().unwrap();
        let auth = GmailAuth::with_token(
            &config_in(dir.path()),
            token(Some(Utc::now() + Duration::hours(1)), None),
        );
        assert!(auth.access_token().await.is_ok());

        auth.invalidate().await;
        assert!(auth.access_token().await.is_err());
    }

    #[tokio::test]
    async fn authorize_without_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let auth = GmailAuth::new(&config_in(dir.path()));

        let err = Authenticator::authorize(&auth).await.unwrap_err();
        assert!(matches!(err, MailError::CredentialsMissing(_)));
    }
}
