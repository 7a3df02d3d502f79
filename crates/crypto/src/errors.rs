use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key storage is unavailable or holds a record that cannot be read.
    #[error("Key storage failure: {0}")]
    Storage(String),

    #[error("No encryption key is stored")]
    KeyMissing,

    /// Authentication tag did not verify, or the payload is malformed.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Invalid key backup: {0}")]
    InvalidKeyBackup(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),
}

impl From<sled::Error> for CryptoError {
    fn from(err: sled::Error) -> Self {
        CryptoError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;
