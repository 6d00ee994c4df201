//! TagPlus API client.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use tracing::{debug, info};

use self::{
    auth::{
        authorization_code::{AuthorizationCode, AuthorizationCodeConfig},
        middleware::OAuth2Middleware,
        persistence::{NullTokenPersistence, TokenPersistence},
        refresh_token::RefreshToken,
        AuthClient, AuthExchangeError,
    },
    config::{
        ConfigOverrides, RequestConfig, APIKEY_HEADER, API_VERSION, API_VERSION_HEADER,
        AUTHORIZE_URL,
    },
    utils::check_status,
};
use crate::core::{AuthMode, ConfigurationError, Credentials};

pub mod auth;
pub mod config;
mod utils;

pub use self::utils::ServerError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("auth: {0}")]
    Auth(#[from] AuthExchangeError),
    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("server: {0}")]
    Server(#[from] ServerError),
}

/// Build the url the user is sent to in order to grant access.
///
/// Values are inserted verbatim, without percent-encoding. An empty
/// `redirect_uri` is left out.
pub fn authorization_url(client_id: &str, scope: &[&str], redirect_uri: Option<&str>) -> String {
    let mut url = format!(
        "{}?response_type=code&client_id={}&scope={}",
        AUTHORIZE_URL,
        client_id,
        scope.join(" "),
    );

    if let Some(redirect_uri) = redirect_uri.filter(|uri| !uri.is_empty()) {
        url.push_str("&redirect_uri=");
        url.push_str(redirect_uri);
    }

    url
}

/// Exchange the `code` received on the redirect uri for a token and hand it
/// to `persistence`.
///
/// Exactly one request is sent to the token endpoint.
pub async fn exchange_authorization_code(
    config: AuthorizationCodeConfig,
    code: &str,
    persistence: Option<Arc<dyn TokenPersistence>>,
    auth_client: Option<AuthClient>,
) -> Result<(), AuthExchangeError> {
    let persistence = persistence.unwrap_or_else(|| Arc::new(NullTokenPersistence));
    let grant = AuthorizationCode::new(auth_client.unwrap_or_default(), config, code);

    OAuth2Middleware::new(persistence)
        .with_grant(grant)
        .acquire_token()
        .await?;
    Ok(())
}

/// Collects the optional parts of a [`Client`].
pub struct ClientBuilder {
    credentials: Credentials,
    overrides: ConfigOverrides,
    persistence: Option<Arc<dyn TokenPersistence>>,
    auth_client: Option<AuthClient>,
}

impl ClientBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            overrides: ConfigOverrides::default(),
            persistence: None,
            auth_client: None,
        }
    }

    pub fn config(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Where OAuth2 tokens are kept. Defaults to [`NullTokenPersistence`].
    pub fn token_persistence(mut self, persistence: Arc<dyn TokenPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Client used for the token endpoint. Defaults to [`AuthClient::default`].
    pub fn auth_client(mut self, auth_client: AuthClient) -> Self {
        self.auth_client = Some(auth_client);
        self
    }

    /// Validate the credentials and assemble the client. Nothing is sent.
    pub fn build(self) -> Result<Client, ConfigurationError> {
        let Self {
            credentials,
            overrides,
            persistence,
            auth_client,
        } = self;

        let auth_mode = credentials.resolve()?;

        let mut config = RequestConfig::default()
            .merge(overrides)
            .force_header(API_VERSION_HEADER, API_VERSION);

        let oauth2 = match (auth_mode, credentials) {
            (
                AuthMode::ApiKey,
                Credentials {
                    apikey: Some(apikey),
                    ..
                },
            ) => {
                config = config.force_header(APIKEY_HEADER, apikey);
                None
            }
            (
                AuthMode::OAuth2,
                Credentials {
                    client_id: Some(client_id),
                    client_secret: Some(client_secret),
                    ..
                },
            ) => {
                let grant =
                    RefreshToken::new(auth_client.unwrap_or_default(), client_id, client_secret);
                let persistence = persistence.unwrap_or_else(|| Arc::new(NullTokenPersistence));
                let middleware = OAuth2Middleware::new(persistence).with_refresh_grant(grant);
                Some(Arc::new(middleware))
            }
            _ => return Err(ConfigurationError::MissingCredentials),
        };

        config.base_url()?;
        let http = reqwest::Client::builder()
            .default_headers(config.header_map()?)
            .build()?;

        debug!(message = "Client configured", auth_mode = ?auth_mode, base_url = %config.base_url);

        Ok(Client {
            http,
            config,
            auth_mode,
            oauth2,
        })
    }
}

/// HTTP client for the TagPlus API.
///
/// Every request carries `x-api-version` and, depending on the credentials,
/// either the `apikey` header or an OAuth2 bearer token.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    config: RequestConfig,
    auth_mode: AuthMode,
    oauth2: Option<Arc<OAuth2Middleware>>,
}

impl Client {
    pub fn new(credentials: Credentials) -> Result<Self, ConfigurationError> {
        ClientBuilder::new(credentials).build()
    }

    pub fn builder(credentials: Credentials) -> ClientBuilder {
        ClientBuilder::new(credentials)
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Start a request to `path`, relative to the base url.
    pub fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http.request(method, self.config.url(path))
    }

    pub async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        let request = builder.build()?;
        self.execute(request).await
    }

    /// Send a request through the auth middleware.
    ///
    /// In OAuth2 mode a `401` answer invalidates the token and the request is
    /// sent once more with a new one, provided its body can be cloned.
    pub async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response, Error> {
        let middleware = match &self.oauth2 {
            Some(middleware) => middleware,
            None => return Ok(self.http.execute(request).await?),
        };

        let retry = request.try_clone();
        middleware.decorate(&mut request).await?;
        let res = self.http.execute(request).await?;

        match retry {
            Some(mut retry) if res.status() == StatusCode::UNAUTHORIZED => {
                info!(message = "Token rejected, retrying with a new one", url = %retry.url());
                middleware.invalidate().await?;
                middleware.decorate(&mut retry).await?;
                Ok(self.http.execute(retry).await?)
            }
            _ => Ok(res),
        }
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response, Error> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<reqwest::Response, Error> {
        self.send(self.request(Method::DELETE, path)).await
    }

    pub async fn post<T>(&self, path: &str, body: &T) -> Result<reqwest::Response, Error>
    where
        T: serde::Serialize + ?Sized,
    {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put<T>(&self, path: &str, body: &T) -> Result<reqwest::Response, Error>
    where
        T: serde::Serialize + ?Sized,
    {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    /// GET `path` and decode the JSON body, failing on non-success statuses.
    pub async fn get_json<T>(&self, path: &str) -> Result<T, Error>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let res = self.get(path).await?;
        let res = check_status(res).await?;
        Ok(res.json().await?)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.config.base_url)
            .field("auth_mode", &self.auth_mode)
            .finish()
    }
}
