use thiserror::Error;

/// Ledger and wallet errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("No Aptos wallet found. Install a supported wallet provider")]
    NoWalletFound,

    #[error("Wallet not connected. Connect a wallet first")]
    NotConnected,

    /// The transaction was rejected, carried no hash, or aborted on chain.
    #[error("Transaction submission failed: {0}")]
    Submission(String),

    #[error("Transaction {hash} not confirmed within {waited_secs}s")]
    ConfirmationTimeout { hash: String, waited_secs: u64 },

    #[error("Attestation contract address is not configured")]
    ContractNotConfigured,

    #[error("Wallet provider error: {0}")]
    Wallet(String),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error (status {status}, code {code}): {message}")]
    ServerError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("parse error: {0}")]
    Parse(String),
}

impl LedgerError {
    pub(crate) fn parse_error(msg: impl Into<String>) -> Self {
        LedgerError::Parse(msg.into())
    }

    pub(crate) fn server_error(
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LedgerError::ServerError {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
