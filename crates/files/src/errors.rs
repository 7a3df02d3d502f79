use genomeguard_types::ContentId;
use thiserror::Error;

/// Errors raised by the publisher and its HTTP collaborators.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The local fallback store could not persist or read a blob.
    #[error("fallback storage failure: {0}")]
    Storage(String),

    #[error("content not found: {0}")]
    NotFound(ContentId),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("pinning service credentials are not configured")]
    NotConfigured,
}

impl PublishError {
    pub(crate) fn server_error(status: u16, message: impl Into<String>) -> Self {
        PublishError::ServerError {
            status,
            message: message.into(),
        }
    }
}

impl From<sled::Error> for PublishError {
    fn from(err: sled::Error) -> Self {
        PublishError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;
