use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    persistence::{NullTokenPersistence, TokenPersistence},
    AuthExchangeError, GrantType, Token,
};

/// Supplies bearer tokens to outgoing requests.
///
/// The token is taken from the cache, then from persistence. Expired tokens
/// are renewed with the refresh grant when possible, otherwise with the
/// initial grant. The cache lock is held during the exchange so concurrent
/// requests wait for a single renewal instead of each starting their own.
pub struct OAuth2Middleware {
    grant: Option<Box<dyn GrantType>>,
    refresh_grant: Option<Box<dyn GrantType>>,
    persistence: Arc<dyn TokenPersistence>,
    cached_token: Mutex<Option<Token>>,
}

impl Default for OAuth2Middleware {
    fn default() -> Self {
        Self::new(Arc::new(NullTokenPersistence))
    }
}

impl OAuth2Middleware {
    pub fn new(persistence: Arc<dyn TokenPersistence>) -> Self {
        Self {
            grant: None,
            refresh_grant: None,
            persistence,
            cached_token: Mutex::const_new(None),
        }
    }

    /// Grant used when there is no usable token to refresh.
    pub fn with_grant(mut self, grant: impl GrantType + 'static) -> Self {
        self.grant = Some(Box::new(grant));
        self
    }

    /// Grant used to renew an expired token that carries a refresh token.
    pub fn with_refresh_grant(mut self, grant: impl GrantType + 'static) -> Self {
        self.refresh_grant = Some(Box::new(grant));
        self
    }

    async fn store(
        &self,
        cached_token: &mut Option<Token>,
        token: Token,
    ) -> Result<Token, AuthExchangeError> {
        self.persistence.save(&token).await?;
        cached_token.replace(token.clone());
        debug!(message = "Got new token", token_expires_at = ?token.expires_at);
        Ok(token)
    }

    /// Return a valid token, obtaining or renewing one if needed.
    pub async fn access_token(&self) -> Result<Token, AuthExchangeError> {
        let mut cached_token = self.cached_token.lock().await;

        if cached_token.is_none() {
            *cached_token = self.persistence.load().await?;
        }

        if let Some(token) = &*cached_token {
            if !token.is_expired() {
                debug!(message = "Using preexisting token", token_expires_at = ?token.expires_at);
                return Ok(token.clone());
            }
            debug!(message = "Existing token expired, refreshing", token_expires_at = ?token.expires_at);
        }

        info!(
            message = "No active token found, about to get a new one",
            token_is_stale = cached_token.is_some(),
        );

        let previous = cached_token.clone();
        let refreshed = match (&self.refresh_grant, &previous) {
            (Some(refresh_grant), Some(previous)) if previous.is_refreshable() => {
                match refresh_grant.get_token(Some(previous)).await {
                    Ok(token) => Some(Ok(token)),
                    Err(err) if self.grant.is_some() => {
                        warn!(message = "Token refresh failed, falling back to grant", error = %err);
                        None
                    }
                    Err(err) => Some(Err(err)),
                }
            }
            _ => None,
        };

        let token = match refreshed {
            Some(result) => result?,
            None => match &self.grant {
                Some(grant) => grant.get_token(previous.as_ref()).await?,
                None if self.refresh_grant.is_some() => {
                    return Err(AuthExchangeError::MissingRefreshToken)
                }
                None => return Err(AuthExchangeError::NoGrant),
            },
        };

        self.store(&mut cached_token, token).await
    }

    /// Run the initial grant unconditionally and persist its token.
    pub async fn acquire_token(&self) -> Result<Token, AuthExchangeError> {
        let mut cached_token = self.cached_token.lock().await;
        let grant = self.grant.as_ref().ok_or(AuthExchangeError::NoGrant)?;

        info!(message = "Acquiring token");
        let token = grant.get_token((*cached_token).as_ref()).await?;
        self.store(&mut cached_token, token).await
    }

    /// Stop trusting the current token.
    ///
    /// A refreshable token is only marked expired in memory: the persisted
    /// copy stays until a renewal replaces it, so a failed refresh does not
    /// lose the refresh token. Any other token is dropped from the cache and
    /// from persistence.
    pub async fn invalidate(&self) -> Result<(), AuthExchangeError> {
        let mut cached_token = self.cached_token.lock().await;
        if cached_token.is_none() {
            *cached_token = self.persistence.load().await?;
        }

        let refreshable = (*cached_token)
            .as_ref()
            .map(Token::is_refreshable)
            .unwrap_or(false);

        if refreshable {
            if let Some(token) = &mut *cached_token {
                token.expires_at = Some(chrono::Utc::now());
            }
        } else {
            *cached_token = None;
            self.persistence.delete().await?;
        }
        Ok(())
    }

    /// Attach `Authorization: Bearer <token>` to the request.
    pub async fn decorate(&self, request: &mut reqwest::Request) -> Result<(), AuthExchangeError> {
        let token = self.access_token().await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
            .map_err(|_| AuthExchangeError::InvalidToken)?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}
