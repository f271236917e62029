use crate::cache::Staleness;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SsoError {
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    #[error("Timed out waiting for AWS SSO: {0}")]
    Timeout(String),

    #[error("Token expired or invalid")]
    TokenExpired,

    #[error("No SSO session found - run `aws sso login` first")]
    NoSessionFound,

    #[error("Invalid SSO configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Local cache is out of date: {0}")]
    StaleCache(Staleness),

    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Selection is ambiguous: {count} roles match")]
    AmbiguousSelection { count: usize },

    #[error("No roles match the selection")]
    NoMatch,

    #[error("Unable to persist cache: {0}")]
    Persistence(String),

    #[error("Cache file is corrupt: {0}")]
    CorruptCache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unable to handle URL: {0}")]
    UrlAction(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),
}

impl SsoError {
    /// Errors a caller can recover from by refreshing or retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, SsoError::StaleCache(_) | SsoError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, SsoError>;
