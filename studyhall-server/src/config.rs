use std::env;

use thiserror::Error;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 3001;

/// Runtime configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the external identity provider.
    pub identity_url: String,
    /// The publishable key sent along with identity checks.
    pub identity_key: String,
    /// Endpoint for the best-effort room mirror. Rooms live only in memory
    /// when this is unset.
    pub store_url: Option<String>,
    pub store_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} must be a port number")]
    InvalidPort(&'static str),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("STUDYHALL_SERVER_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidPort("STUDYHALL_SERVER_PORT"))?,
            Err(_) => DEFAULT_PORT,
        };

        let identity_url = env::var("STUDYHALL_IDENTITY_URL")
            .map_err(|_| ConfigError::Missing("STUDYHALL_IDENTITY_URL"))?;
        let identity_key = env::var("STUDYHALL_IDENTITY_KEY")
            .map_err(|_| ConfigError::Missing("STUDYHALL_IDENTITY_KEY"))?;

        let store_url = env::var("STUDYHALL_STORE_URL").ok();
        let store_key = env::var("STUDYHALL_STORE_KEY").ok();

        Ok(Self {
            port,
            identity_url,
            identity_key,
            store_url,
            store_key,
        })
    }
}
