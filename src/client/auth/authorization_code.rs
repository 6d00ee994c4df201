//! Exchange a user-consent code for the first token pair.

use serde::Deserialize;

use super::{AuthClient, AuthExchangeError, GrantType, Token};

/// Settings of the authorization code exchange.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationCodeConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
    /// Space separated scopes.
    #[serde(default)]
    pub scope: String,
}

pub struct AuthorizationCode {
    pub client: AuthClient,
    pub config: AuthorizationCodeConfig,
    pub code: String,
}

impl AuthorizationCode {
    pub fn new(
        client: AuthClient,
        config: AuthorizationCodeConfig,
        code: impl Into<String>,
    ) -> Self {
        Self {
            client,
            config,
            code: code.into(),
        }
    }

    /// Perform the authorization code exchange.
    pub async fn perform(&self) -> Result<Token, AuthExchangeError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", self.code.as_str()),
        ];
        if !self.config.redirect_uri.is_empty() {
            params.push(("redirect_uri", self.config.redirect_uri.as_str()));
        }
        if !self.config.scope.is_empty() {
            params.push(("scope", self.config.scope.as_str()));
        }

        self.client
            .request_token(&self.config.client_id, &self.config.client_secret, &params)
            .await
    }
}

#[async_trait::async_trait]
impl GrantType for AuthorizationCode {
    async fn get_token(&self, _previous: Option<&Token>) -> Result<Token, AuthExchangeError> {
        self.perform().await
    }
}
