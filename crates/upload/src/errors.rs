use genomeguard_crypto::CryptoError;
use genomeguard_files::PublishError;
use genomeguard_ledger::LedgerError;
use thiserror::Error;

/// Errors from the analysis backend's upload API.
#[derive(Debug, Error)]
pub enum BackendError {
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
}

/// Failure of an upload or of a related pipeline operation.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Rejected before any stage ran.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("No encryption key is stored")]
    KeyMissing,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("No Aptos wallet found. Install a supported wallet provider")]
    NoWalletFound,

    #[error("Wallet not connected. Connect a wallet first")]
    NotConnected,

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Transaction submission failed: {0}")]
    Submission(String),

    #[error("Transaction {hash} not confirmed within {waited_secs}s")]
    ConfirmationTimeout { hash: String, waited_secs: u64 },

    /// Ledger reads and other ledger failures outside the submission path.
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Backend failure: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<CryptoError> for UploadError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Storage(msg) => UploadError::Storage(msg),
            CryptoError::KeyMissing => UploadError::KeyMissing,
            CryptoError::Integrity(msg) => UploadError::Integrity(msg),
            CryptoError::InvalidKeyBackup(msg) => UploadError::Validation(msg),
            CryptoError::Encryption(msg) => UploadError::Encryption(msg),
        }
    }
}

impl From<PublishError> for UploadError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Storage(msg) => UploadError::Storage(msg),
            other => UploadError::Publish(other.to_string()),
        }
    }
}

impl From<LedgerError> for UploadError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NoWalletFound => UploadError::NoWalletFound,
            LedgerError::NotConnected => UploadError::NotConnected,
            LedgerError::Submission(msg) => UploadError::Submission(msg),
            LedgerError::ConfirmationTimeout { hash, waited_secs } => {
                UploadError::ConfirmationTimeout { hash, waited_secs }
            }
            other => UploadError::Ledger(other.to_string()),
        }
    }
}

impl From<BackendError> for UploadError {
    fn from(err: BackendError) -> Self {
        UploadError::Backend(err.to_string())
    }
}

impl From<sled::Error> for UploadError {
    fn from(err: sled::Error) -> Self {
        UploadError::Storage(err.to_string())
    }
}

impl From<config::ConfigError> for UploadError {
    fn from(err: config::ConfigError) -> Self {
        UploadError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
