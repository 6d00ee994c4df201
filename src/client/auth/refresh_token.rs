//! Renew an access token using the refresh token of a previous one.

use super::{AuthClient, AuthExchangeError, GrantType, Token};

pub struct RefreshToken {
    pub client: AuthClient,
    pub client_id: String,
    pub client_secret: String,
}

impl RefreshToken {
    pub fn new(
        client: AuthClient,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Perform the refresh token flow.
    ///
    /// The server may omit a new refresh token, in which case the one that was
    /// used stays valid and is carried over.
    pub async fn perform(&self, refresh_token: &str) -> Result<Token, AuthExchangeError> {
        let params = &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let mut token = self
            .client
            .request_token(&self.client_id, &self.client_secret, params)
            .await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_owned());
        }
        Ok(token)
    }
}

#[async_trait::async_trait]
impl GrantType for RefreshToken {
    async fn get_token(&self, previous: Option<&Token>) -> Result<Token, AuthExchangeError> {
        let refresh_token = previous
            .and_then(|token| token.refresh_token.as_deref())
            .ok_or(AuthExchangeError::MissingRefreshToken)?;
        self.perform(refresh_token).await
    }
}
