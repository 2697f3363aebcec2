//! Error types for pangea-login

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using pangea-login's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Terminal failures surfaced to the caller of a login flow.
///
/// Rejected callbacks never show up here: the listener answers them with a
/// 401 and keeps waiting (see [`crate::auth::server::CallbackRejection`]).
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to start callback listener on {addr}: {reason}")]
    ListenerStartFailed { addr: SocketAddr, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Timed out after {limit:?} waiting for the browser login to complete")]
    Timeout { limit: Duration },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    pub(crate) fn auth_failed(message: impl Into<String>) -> Self {
        Error::AuthenticationFailed {
            message: message.into(),
        }
    }
}
