//! Request configuration shared by every call a [`Client`](super::Client) makes.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

use crate::core::ConfigurationError;

pub const BASE_URL: &str = "https://api.tagplus.com.br";
pub const TOKEN_PATH: &str = "/oauth2/token";
pub const AUTHORIZE_URL: &str = "https://apidoc.tagplus.com.br/authorize";

pub const API_VERSION_HEADER: &str = "x-api-version";
pub const API_VERSION: &str = "2.0";
pub const APIKEY_HEADER: &str = "apikey";

/// Caller-supplied overrides, e.g. `{"baseUrl": "...", "headers": {...}}`.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub headers: BTreeMap<String, String>,
}

/// Effective configuration: base url plus default headers.
///
/// Header names are stored lowercased, HTTP header names being
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfig {
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_owned(),
            headers: BTreeMap::new(),
        }
    }
}

impl RequestConfig {
    /// Merge overrides into this config. Headers are added to the existing
    /// ones; a base url replaces the current one.
    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        let ConfigOverrides { base_url, headers } = overrides;
        if let Some(base_url) = base_url {
            self.base_url = base_url;
        }
        for (name, value) in headers {
            self.headers.insert(name.to_ascii_lowercase(), value);
        }
        self
    }

    /// Set a header, replacing whatever value it had.
    pub fn force_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn header_map(&self) -> Result<HeaderMap, ConfigurationError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let invalid = || ConfigurationError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let mut header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            if name == APIKEY_HEADER {
                header_value.set_sensitive(true);
            }
            map.insert(header_name, header_value);
        }
        Ok(map)
    }

    pub fn base_url(&self) -> Result<reqwest::Url, ConfigurationError> {
        reqwest::Url::parse(&self.base_url)
            .map_err(|_| ConfigurationError::InvalidBaseUrl(self.base_url.clone()))
    }

    /// Absolute url for `path`, relative to the base url.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
