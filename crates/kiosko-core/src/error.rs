//! Workspace-wide error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, KioskoError>;

#[derive(Debug, Error)]
pub enum KioskoError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("rewrite error: {0}")]
    Rewrite(String),

    #[error("API key missing for {0}")]
    ApiKeyMissing(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
