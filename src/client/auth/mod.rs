//! OAuth2 token handling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use self::persistence::PersistenceError;
use super::{
    config::{BASE_URL, TOKEN_PATH},
    utils::{check_status, ServerError},
};

pub mod authorization_code;
pub mod middleware;
pub mod persistence;
pub mod refresh_token;

#[derive(Debug, thiserror::Error)]
pub enum AuthExchangeError {
    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("server: {0}")]
    Server(#[from] ServerError),
    #[error("form encoding: {0}")]
    Encoding(#[from] serde_urlencoded::ser::Error),
    #[error("persistence: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("no refresh token available")]
    MissingRefreshToken,
    #[error("no grant configured to obtain a token")]
    NoGrant,
    #[error("access token is not a valid header value")]
    InvalidToken,
}

/// A strategy that obtains a token from the token endpoint.
#[async_trait::async_trait]
pub trait GrantType: Send + Sync {
    /// `previous` is the last known token, possibly expired.
    async fn get_token(&self, previous: Option<&Token>) -> Result<Token, AuthExchangeError>;
}

/// HTTP client dedicated to the token endpoint.
#[derive(Debug, Clone)]
pub struct AuthClient {
    pub client: reqwest::Client,
    pub token_url: String,
}

impl Default for AuthClient {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: format!("{}{}", BASE_URL, TOKEN_PATH),
        }
    }
}

impl AuthClient {
    pub fn new(client: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            client,
            token_url: token_url.into(),
        }
    }

    /// Post a grant request, authenticating the client with HTTP basic auth.
    pub(crate) async fn request_token<P>(
        &self,
        client_id: &str,
        client_secret: &str,
        params: &P,
    ) -> Result<Token, AuthExchangeError>
    where
        P: Serialize + ?Sized,
    {
        let params = serde_urlencoded::to_string(params)?;

        let req = self
            .client
            .post(&self.token_url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .basic_auth(client_id, Some(client_secret))
            .body(params)
            .build()?;

        debug!(message = "Requesting token", token_url = %self.token_url);

        let res = self.client.execute(req).await?;
        let res = check_status(res).await?;
        let token_response: TokenResponse = res.json().await?;
        Ok(token_response.into())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Tokens without an expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| expires_at <= Utc::now())
            .unwrap_or(false)
    }

    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// Body returned by the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    expires_in: Option<ExpiresIn>,
}

/// Some servers send `expires_in` as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Seconds(i64),
    Text(String),
}

impl ExpiresIn {
    fn seconds(&self) -> Option<i64> {
        match self {
            Self::Seconds(seconds) => Some(*seconds),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl From<TokenResponse> for Token {
    fn from(res: TokenResponse) -> Self {
        let TokenResponse {
            access_token,
            refresh_token,
            expires_in,
        } = res;
        let expires_at = expires_in
            .as_ref()
            .and_then(ExpiresIn::seconds)
            .and_then(chrono::Duration::try_seconds)
            .and_then(|expires_in| Utc::now().checked_add_signed(expires_in));
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }
}
