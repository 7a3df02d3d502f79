//! Drives one upload end to end.
//!
//! Two paths exist. The traditional path forwards the raw file to the
//! backend. The on-chain path encrypts locally, publishes the ciphertext,
//! anchors its content id on the ledger and only then notifies the backend.
//! Each stage runs only if the previous one succeeded.

use genomeguard_crypto::sha256_hex;
use genomeguard_files::PublishMetadata;
use genomeguard_types::{AttestationRecord, ContentId, ContentRecord};
use std::sync::Arc;
use tracing::{error, info};

use crate::backend::BackendAttestation;
use crate::context::PipelineContext;
use crate::errors::*;
use crate::file::UploadFile;
use crate::progress::{ProgressReporter, TracingProgress, UploadStage};

/// Ephemeral state of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub stage: UploadStage,
    pub use_blockchain: bool,
    pub content_record: Option<ContentRecord>,
    pub attestation_record: Option<AttestationRecord>,
    pub result_analysis_id: Option<String>,
}

impl UploadSession {
    fn new(use_blockchain: bool) -> Self {
        Self {
            stage: UploadStage::Idle,
            use_blockchain,
            content_record: None,
            attestation_record: None,
            result_analysis_id: None,
        }
    }
}

/// What a successful upload produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub analysis_id: String,
    pub on_chain: bool,
    pub content_record: Option<ContentRecord>,
    pub attestation_record: Option<AttestationRecord>,
}

impl UploadOutcome {
    /// True when any stage fell back to a local stand-in.
    pub fn is_mock(&self) -> bool {
        self.content_record.as_ref().is_some_and(|r| r.mock)
            || self.attestation_record.as_ref().is_some_and(|r| r.mock)
    }
}

pub struct Orchestrator {
    ctx: PipelineContext,
    progress: Arc<dyn ProgressReporter>,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            progress: Arc::new(TracingProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    fn enter(&self, session: &mut UploadSession, stage: UploadStage) {
        session.stage = stage;
        self.progress.report(stage);
    }

    pub async fn upload(&self, file: UploadFile, use_blockchain: bool) -> Result<UploadOutcome> {
        file.validate()?;
        if use_blockchain && !self.ctx.attestation.is_connected() {
            return Err(UploadError::NotConnected);
        }

        let mut session = UploadSession::new(use_blockchain);
        info!(file = %file.name, size_bytes = file.size, on_chain = use_blockchain, "Starting upload");

        let result = if use_blockchain {
            self.run_on_chain(&file, &mut session).await
        } else {
            self.run_traditional(&file, &mut session).await
        };

        match result {
            Ok(analysis_id) => {
                session.result_analysis_id = Some(analysis_id.clone());
                self.enter(&mut session, UploadStage::Complete);
                info!(file = %file.name, %analysis_id, "Upload complete");
                Ok(UploadOutcome {
                    analysis_id,
                    on_chain: use_blockchain,
                    content_record: session.content_record,
                    attestation_record: session.attestation_record,
                })
            }
            Err(e) => {
                error!(file = %file.name, stage = ?session.stage, error = %e, "Upload failed");
                self.enter(&mut session, UploadStage::Failed);
                Err(e)
            }
        }
    }

    async fn run_traditional(&self, file: &UploadFile, session: &mut UploadSession) -> Result<String> {
        self.enter(session, UploadStage::SendingToBackend);
        let contents = file.read_bytes().await?;
        let receipt = self.ctx.backend.upload(&file.name, contents, None).await?;
        Ok(receipt.analysis_id)
    }

    async fn run_on_chain(&self, file: &UploadFile, session: &mut UploadSession) -> Result<String> {
        self.enter(session, UploadStage::Reading);
        let text = file.read_text().await?;

        self.enter(session, UploadStage::Encrypting);
        let payload = self.ctx.engine.encrypt(&text)?;
        info!(key_id = %payload.key_id, "File encrypted");

        self.enter(session, UploadStage::Publishing);
        let ciphertext = payload.ciphertext_base64.into_bytes();
        let metadata = PublishMetadata::new()
            .with_filename(file.name.clone())
            .with_entry("size", file.size)
            .with_entry("fingerprint", sha256_hex(&ciphertext));
        let content = self.ctx.publisher.publish(&ciphertext, metadata).await?;
        let content_id: ContentId = content.content_id.clone();
        session.content_record = Some(content.clone());

        self.enter(session, UploadStage::Attesting);
        let attestation = self.ctx.attestation.request_attestation(&content_id).await?;
        session.attestation_record = Some(attestation.clone());

        self.enter(session, UploadStage::SendingToBackend);
        let handoff = BackendAttestation {
            content_id,
            transaction_ref: attestation.transaction_ref.clone(),
            analysis_ref_hint: attestation.analysis_id,
            mock: attestation.mock || content.mock,
        };
        let receipt = self
            .ctx
            .backend
            .upload(&file.name, text.into_bytes(), Some(&handoff))
            .await?;
        Ok(receipt.analysis_id)
    }

    /// Fetch published ciphertext and decrypt it with the local key.
    pub async fn retrieve(&self, content_id: &ContentId) -> Result<String> {
        let bytes = self.ctx.publisher.fetch(content_id).await?;
        let ciphertext = String::from_utf8(bytes)
            .map_err(|_| UploadError::Integrity("ciphertext is not base64 text".to_string()))?;
        Ok(self.ctx.engine.decrypt(&ciphertext)?)
    }
}
