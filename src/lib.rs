pub mod client;
pub mod core;

pub use crate::client::{
    authorization_url, exchange_authorization_code, Client, ClientBuilder, Error,
};
pub use crate::core::{AuthMode, ConfigurationError, Credentials};
