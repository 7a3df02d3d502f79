use serde::{Deserialize, Serialize};
use std::fmt;

/// Analysis id reported by synthetic attestations.
pub const MOCK_ANALYSIS_ID: u64 = 1;

/// Ledger commitment to a published content record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRecord {
    /// Domain identifier taken from the confirmed request event, if any.
    pub analysis_id: Option<u64>,

    /// Transaction hash, or a synthetic reference for mock attestations.
    pub transaction_ref: String,

    /// True when no real transaction was confirmed.
    pub mock: bool,
}

impl AttestationRecord {
    /// Synthetic record used while the attestation contract is not deployed.
    pub fn mock(now_millis: i64) -> Self {
        Self {
            analysis_id: Some(MOCK_ANALYSIS_ID),
            transaction_ref: format!("0xmock{now_millis}"),
            mock: true,
        }
    }

    pub fn confirmed(transaction_ref: impl Into<String>, analysis_id: Option<u64>) -> Self {
        Self {
            analysis_id,
            transaction_ref: transaction_ref.into(),
            mock: false,
        }
    }
}

/// Lifecycle of an analysis as tracked by the attestation contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Unknown,
}

impl AnalysisStatus {
    /// Map the contract's ordinal status code.
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => AnalysisStatus::Pending,
            1 => AnalysisStatus::Processing,
            2 => AnalysisStatus::Completed,
            3 => AnalysisStatus::Failed,
            _ => AnalysisStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "PENDING",
            AnalysisStatus::Processing => "PROCESSING",
            AnalysisStatus::Completed => "COMPLETED",
            AnalysisStatus::Failed => "FAILED",
            AnalysisStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
