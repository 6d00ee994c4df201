use serde::Deserialize;

/// Credentials supplied by the caller.
///
/// Exactly one shape is accepted: an `apikey`, or a `client_id` together with
/// a `client_secret`. The fields are optional so that invalid mappings can be
/// represented and rejected by [`Credentials::resolve`].
#[derive(Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub apikey: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("apikey", &self.apikey.as_ref().map(|_| "[REDACTED]"))
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    ApiKey,
    OAuth2,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("You must send an apikey or client_id/client_secret")]
    MissingCredentials,
    #[error("You must use either apikey or oauth2 (client_id/client_secret), but not both")]
    ConflictingCredentials,
    #[error("invalid value for header {name}")]
    InvalidHeader { name: String },
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl Credentials {
    pub fn api_key(apikey: impl Into<String>) -> Self {
        Self {
            apikey: Some(apikey.into()),
            ..Self::default()
        }
    }

    pub fn oauth2(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            ..Self::default()
        }
    }

    /// Select the auth mode, rejecting missing or conflicting credentials.
    pub fn resolve(&self) -> Result<AuthMode, ConfigurationError> {
        let has_apikey = self.apikey.is_some();
        let has_oauth2 = self.client_id.is_some() && self.client_secret.is_some();

        match (has_apikey, has_oauth2) {
            (true, false) => Ok(AuthMode::ApiKey),
            (false, true) => Ok(AuthMode::OAuth2),
            (false, false) => Err(ConfigurationError::MissingCredentials),
            (true, true) => Err(ConfigurationError::ConflictingCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apikey_selects_apikey_mode() {
        let mode = Credentials::api_key("xyz").resolve().unwrap();
        assert_eq!(mode, AuthMode::ApiKey);
    }

    #[test]
    fn client_pair_selects_oauth2_mode() {
        let mode = Credentials::oauth2("abc", "xyz").resolve().unwrap();
        assert_eq!(mode, AuthMode::OAuth2);
    }

    #[test]
    fn empty_credentials_are_missing() {
        let err = Credentials::default().resolve().unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingCredentials));
    }

    #[test]
    fn half_a_pair_is_missing() {
        let only_id = Credentials {
            client_id: Some("abc".into()),
            ..Credentials::default()
        };
        let only_secret = Credentials {
            client_secret: Some("xyz".into()),
            ..Credentials::default()
        };
        assert!(matches!(
            only_id.resolve(),
            Err(ConfigurationError::MissingCredentials)
        ));
        assert!(matches!(
            only_secret.resolve(),
            Err(ConfigurationError::MissingCredentials)
        ));
    }

    #[test]
    fn apikey_with_client_pair_conflicts() {
        let credentials = Credentials {
            apikey: Some("xxx".into()),
            client_id: Some("yyy".into()),
            client_secret: Some("zzz".into()),
        };
        assert!(matches!(
            credentials.resolve(),
            Err(ConfigurationError::ConflictingCredentials)
        ));
    }

    #[test]
    fn apikey_with_lone_client_id_is_apikey() {
        let credentials = Credentials {
            apikey: Some("xxx".into()),
            client_id: Some("yyy".into()),
            client_secret: None,
        };
        assert_eq!(credentials.resolve().unwrap(), AuthMode::ApiKey);
    }

    #[test]
    fn deserializes_from_mapping() {
        let credentials: Credentials =
            serde_json::from_str(r#"{"client_id": "abc", "client_secret": "xyz"}"#).unwrap();
        assert_eq!(credentials, Credentials::oauth2("abc", "xyz"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", Credentials::api_key("super-secret"));
        assert!(!debug.contains("super-secret"));
    }
}
