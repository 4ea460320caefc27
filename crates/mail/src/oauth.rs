//! OAuth2 for Gmail using the installed app flow.
//!
//! The flow listens on an ephemeral loopback port, sends the user to
//! Google's consent page with a PKCE challenge and a random `state`, and
//! exchanges the returned code for tokens. Refresh uses the stored
//! refresh token.

use std::time::Duration;
use base64::Engine;
use chrono::Utc;
use mailwright_core::MailError;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use crate::GMAIL_SEND_SCOPE;
use crate::credentials::{ClientSecrets, StoredToken};

/// How long to wait for the browser to come back.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Tokens returned by Google's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Merge into a storable token. Google omits the refresh token on
    /// refresh responses, so the previous one is kept.
    pub fn into_stored(self, previous: Option<&StoredToken>, client: &ClientSecrets) -> StoredToken {
        let scopes = self
            .scope
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .or_else(|| previous.map(|p| p.scopes.clone()))
            .unwrap_or_else(|| vec![GMAIL_SEND_SCOPE.to_string()]);

        StoredToken {
            token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            token_uri: client.token_uri.clone(),
            client_id: Some(client.client_id.clone()),
            client_secret: client.client_secret.clone(),
            scopes,
            expiry: self
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }
    }
}

/// Error body from Google
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Gmail OAuth2 client.
pub struct GoogleOAuth {
    client: ClientSecrets,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(client: ClientSecrets) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, http }
    }

    /// Rebuild the client identity recorded inside a stored token.
    pub fn from_token(token: &StoredToken) -> Option<Self> {
        let client_id = token.client_id.clone()?;
        Some(Self::new(ClientSecrets {
            client_id,
            client_secret: token.client_secret.clone(),
            auth_uri: crate::credentials::GOOGLE_AUTH_URL.into(),
            token_uri: token.token_uri.clone(),
        }))
    }

    pub fn client(&self) -> &ClientSecrets {
        &self.client
    }

    /// Refresh an access token. The returned token keeps the old refresh token.
    pub async fn refresh(&self, token: &StoredToken) -> Result<StoredToken, MailError> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| MailError::TokenRefresh("no refresh token stored".into()))?;

        let mut params = vec![
            ("client_id", self.client.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        if let Some(secret) = self.client.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        debug!("Refreshing Gmail access token");
        let response = self.post_form(&params).await.map_err(MailError::TokenRefresh)?;
        Ok(response.into_stored(Some(token), &self.client))
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: &str,
    ) -> Result<StoredToken, MailError> {
        let mut params = vec![
            ("client_id", self.client.client_id.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
            ("code_verifier", pkce_verifier),
        ];
        if let Some(secret) = self.client.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let response = self.post_form(&params).await.map_err(MailError::Authorization)?;
        Ok(response.into_stored(None, &self.client))
    }

    async fn post_form(&self, params: &[(&str, &str)]) -> Result<TokenResponse, String> {
        let response = self
            .http
            .post(&self.client.token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error: ErrorResponse = response.json().await.unwrap_or(ErrorResponse {
                error: "unknown_error".to_string(),
                error_description: None,
            });
            warn!(status, error = %error.error, "Token endpoint rejected request");
            return Err(match error.error_description {
                Some(desc) => format!("{} ({desc})", error.error),
                None => error.error,
            });
        }

        response
            .json()
            .await
            .map_err(|e| format!("failed to parse token response: {e}"))
    }

    /// Bind a loopback listener and build the consent URL.
    pub async fn start_flow(&self) -> Result<LoopbackFlow, MailError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}");

        let verifier = random_urlsafe(32);
        let state = random_urlsafe(16);

        let auth_url = reqwest::Url::parse_with_params(
            &self.client.auth_uri,
            &[
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", GMAIL_SEND_SCOPE),
                ("code_challenge", pkce_challenge(&verifier).as_str()),
                ("code_challenge_method", "S256"),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| MailError::Authorization(format!("invalid auth_uri: {e}")))?
        .to_string();

        debug!(redirect_uri = %redirect_uri, "OAuth loopback listener ready");

        Ok(LoopbackFlow {
            auth_url,
            redirect_uri,
            verifier,
            state,
            listener,
        })
    }

    /// Run the whole flow: wait for the browser, then exchange the code.
    pub async fn complete_flow(&self, flow: LoopbackFlow) -> Result<StoredToken, MailError> {
        let code = flow.wait_for_callback(CALLBACK_TIMEOUT).await?;
        info!("Authorization code received, exchanging for tokens");
        self.exchange_code(&code, &flow.redirect_uri, &flow.verifier).await
    }
}

/// An in-progress installed app flow.
pub struct LoopbackFlow {
    /// Where the user must go to grant access
    pub auth_url: String,
    pub redirect_uri: String,
    verifier: String,
    state: String,
    listener: TcpListener,
}

impl LoopbackFlow {
    /// Wait for Google to redirect the browser back with a code.
    pub async fn wait_for_callback(&self, timeout: Duration) -> Result<String, MailError> {
        tokio::time::timeout(timeout, self.accept_callback())
            .await
            .map_err(|_| MailError::Authorization("OAuth callback timed out".into()))?
    }

    async fn accept_callback(&self) -> Result<String, MailError> {
        loop {
            let (mut stream, _) = self.listener.accept().await?;
            let mut request_line = String::new();
            {
                let mut reader = BufReader::new(&mut stream);
                reader.read_line(&mut request_line).await?;
            }

            match parse_callback(&request_line, &self.state) {
                Ok(Some(code)) => {
                    respond(
                        &mut stream,
                        "200 OK",
                        "Authorization successful",
                        "You can close this window and return to Mailwright.",
                    )
                    .await;
                    return Ok(code);
                }
                Ok(None) => {
                    // favicon and other stray requests
                    respond(&mut stream, "404 Not Found", "Not found", "").await;
                }
                Err(e) => {
                    respond(
                        &mut stream,
                        "400 Bad Request",
                        "Authorization failed",
                        "Please close this window and try again.",
                    )
                    .await;
                    return Err(e);
                }
            }
        }
    }
}

async fn respond(stream: &mut tokio::net::TcpStream, status: &str, title: &str, message: &str) {
    let body = format!("<html><body><h1>{title}</h1><p>{message}</p></body></html>");
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!(error = %e, "Failed to answer OAuth callback request");
    }
}

/// Inspect the request line of a loopback request.
///
/// `Ok(None)` means the request is not the OAuth redirect.
fn parse_callback(request_line: &str, expected_state: &str) -> Result<Option<String>, MailError> {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Ok(None);
    };
    let url = reqwest::Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| MailError::Authorization(format!("malformed callback: {e}")))?;

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    if let Some(error) = param("error") {
        let description = param("error_description").unwrap_or_default();
        return Err(MailError::Authorization(format!("{error} {description}").trim().to_string()));
    }

    let Some(code) = param("code") else {
        return Ok(None);
    };

    match param("state") {
        Some(state) if state == expected_state => Ok(Some(code)),
        Some(_) => Err(MailError::Authorization("state parameter mismatch".into())),
        None => Err(MailError::Authorization("no state parameter in callback".into())),
    }
}

/// S256 PKCE challenge for a verifier.
fn pkce_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
