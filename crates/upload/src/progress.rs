use std::fmt;
use tracing::info;

/// Stage of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadStage {
    Idle,
    Reading,
    Encrypting,
    Publishing,
    Attesting,
    SendingToBackend,
    Complete,
    Failed,
}

impl UploadStage {
    /// Human-readable progress label.
    pub fn label(&self) -> &'static str {
        match self {
            UploadStage::Idle => "Waiting...",
            UploadStage::Reading => "Reading file...",
            UploadStage::Encrypting => "Encrypting data (client-side)...",
            UploadStage::Publishing => "Uploading to IPFS...",
            UploadStage::Attesting => "Submitting to ledger...",
            UploadStage::SendingToBackend => "Sending to analysis pipeline...",
            UploadStage::Complete => "Complete!",
            UploadStage::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStage::Complete | UploadStage::Failed)
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives a notification every time an upload enters a new stage.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, stage: UploadStage);
}

/// Logs progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, stage: UploadStage) {
        info!(stage = ?stage, "{}", stage.label());
    }
}
