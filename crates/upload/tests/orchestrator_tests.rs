use async_trait::async_trait;
use genomeguard_crypto::KeyStore;
use genomeguard_files::{ContentPublisher, FallbackStore, PinningPublisher};
use genomeguard_ledger::{
    AccountInfo, AccountResource, AttestationClient, AttestationConfig, EntryFunctionPayload,
    GasSettings, LedgerClient, LedgerTransaction, PendingTransaction, SimulationOutcome,
    ViewRequest, WalletAccount, WalletProvider, WalletRegistry,
};
use genomeguard_types::{ContentId, MOCK_ANALYSIS_ID};
use genomeguard_upload::*;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const SAMPLE_VCF: &str = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\n1\t12345\trs1\tA\tG\n";

struct MockWallet {
    hash: Option<String>,
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn name(&self) -> &str {
        "mock"
    }

    async fn is_installed(&self) -> bool {
        true
    }

    async fn connect(&self) -> genomeguard_ledger::Result<WalletAccount> {
        Ok(account())
    }

    async fn account(&self) -> genomeguard_ledger::Result<Option<WalletAccount>> {
        Ok(Some(account()))
    }

    async fn disconnect(&self) -> genomeguard_ledger::Result<()> {
        Ok(())
    }

    async fn sign_and_submit_transaction(
        &self,
        _payload: &EntryFunctionPayload,
        _gas: &GasSettings,
    ) -> genomeguard_ledger::Result<PendingTransaction> {
        Ok(PendingTransaction {
            hash: self.hash.clone(),
        })
    }
}

fn account() -> WalletAccount {
    WalletAccount {
        address: "0xuser".to_string(),
        public_key: None,
    }
}

/// Ledger that never holds any transaction.
struct EmptyLedger;

#[async_trait]
impl LedgerClient for EmptyLedger {
    async fn transaction_by_hash(
        &self,
        _hash: &str,
    ) -> genomeguard_ledger::Result<Option<LedgerTransaction>> {
        Ok(None)
    }

    async fn view(&self, _request: &ViewRequest) -> genomeguard_ledger::Result<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn account(&self, _address: &str) -> genomeguard_ledger::Result<AccountInfo> {
        Ok(AccountInfo {
            sequence_number: "0".to_string(),
            authentication_key: None,
        })
    }

    async fn account_resources(
        &self,
        _address: &str,
    ) -> genomeguard_ledger::Result<Vec<AccountResource>> {
        Ok(Vec::new())
    }

    async fn simulate(
        &self,
        _sender: &WalletAccount,
        _payload: &EntryFunctionPayload,
        _gas: &GasSettings,
    ) -> genomeguard_ledger::Result<SimulationOutcome> {
        Ok(SimulationOutcome {
            success: true,
            vm_status: "Executed successfully".to_string(),
            gas_used: "1".to_string(),
        })
    }

    async fn fund_account(
        &self,
        _address: &str,
        _amount: u64,
    ) -> genomeguard_ledger::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone)]
struct BackendCall {
    file_name: String,
    contents: Vec<u8>,
    attestation: Option<BackendAttestation>,
}

#[derive(Default)]
struct MockBackend {
    fail: bool,
    calls: Mutex<Vec<BackendCall>>,
}

#[async_trait]
impl BackendClient for MockBackend {
    async fn upload(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        attestation: Option<&BackendAttestation>,
    ) -> std::result::Result<BackendReceipt, BackendError> {
        self.calls.lock().push(BackendCall {
            file_name: file_name.to_string(),
            contents,
            attestation: attestation.cloned(),
        });
        if self.fail {
            return Err(BackendError::ServerError {
                status: 500,
                message: "analysis queue unavailable".to_string(),
            });
        }
        Ok(BackendReceipt {
            analysis_id: "analysis-42".to_string(),
        })
    }
}

#[derive(Default)]
struct RecordingProgress {
    stages: Mutex<Vec<UploadStage>>,
}

impl RecordingProgress {
    fn labels(&self) -> Vec<&'static str> {
        self.stages.lock().iter().map(|s| s.label()).collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, stage: UploadStage) {
        self.stages.lock().push(stage);
    }
}

struct Harness {
    orchestrator: Orchestrator,
    attestation: Arc<AttestationClient>,
    publisher: Arc<PinningPublisher>,
    backend: Arc<MockBackend>,
    progress: Arc<RecordingProgress>,
}

fn harness(contract_address: Option<&str>, wallet_hash: Option<&str>, backend: MockBackend) -> Harness {
    let keys = Arc::new(KeyStore::temporary().unwrap());
    let fallback = Arc::new(FallbackStore::temporary(1024 * 1024).unwrap());
    let publisher = Arc::new(PinningPublisher::new(fallback));

    let wallet: Arc<dyn WalletProvider> = Arc::new(MockWallet {
        hash: wallet_hash.map(str::to_string),
    });
    let config = AttestationConfig {
        contract_address: contract_address.map(str::to_string),
        confirmation_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(5),
        ..AttestationConfig::default()
    };
    let attestation = Arc::new(AttestationClient::new(
        config,
        WalletRegistry::new(Some(wallet), None),
        Arc::new(EmptyLedger),
    ));

    let backend = Arc::new(backend);
    let progress = Arc::new(RecordingProgress::default());
    let ctx = PipelineContext::new(
        keys,
        publisher.clone(),
        attestation.clone(),
        backend.clone(),
    );
    Harness {
        orchestrator: Orchestrator::new(ctx).with_progress(progress.clone()),
        attestation,
        publisher,
        backend,
        progress,
    }
}

#[tokio::test]
async fn test_on_chain_upload_with_local_stand_ins() {
    let h = harness(None, None, MockBackend::default());
    h.attestation.connect_wallet().await.unwrap();

    let file = UploadFile::from_bytes("sample.vcf", SAMPLE_VCF.as_bytes().to_vec());
    let outcome = h.orchestrator.upload(file, true).await.unwrap();

    assert_eq!(outcome.analysis_id, "analysis-42");
    assert!(outcome.on_chain);
    assert!(outcome.is_mock());

    let content = outcome.content_record.clone().unwrap();
    assert!(content.mock);
    assert!(content.content_id.is_fallback());
    assert!(h.publisher.fallback().contains(&content.content_id).unwrap());

    let attestation = outcome.attestation_record.clone().unwrap();
    assert!(attestation.mock);
    assert_eq!(attestation.analysis_id, Some(MOCK_ANALYSIS_ID));
    assert!(attestation.transaction_ref.starts_with("0xmock"));

    assert_eq!(
        h.progress.labels(),
        vec![
            "Reading file...",
            "Encrypting data (client-side)...",
            "Uploading to IPFS...",
            "Submitting to ledger...",
            "Sending to analysis pipeline...",
            "Complete!",
        ]
    );

    let calls = h.backend.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].file_name, "sample.vcf");
    assert_eq!(calls[0].contents, SAMPLE_VCF.as_bytes());
    let handoff = calls[0].attestation.clone().unwrap();
    assert_eq!(handoff.content_id, content.content_id);
    assert_eq!(handoff.transaction_ref, attestation.transaction_ref);
    assert_eq!(handoff.analysis_ref_hint, Some(MOCK_ANALYSIS_ID));
    assert!(handoff.mock);
}

#[tokio::test]
async fn test_published_blob_is_ciphertext_and_retrievable() {
    let h = harness(None, None, MockBackend::default());
    h.attestation.connect_wallet().await.unwrap();

    let file = UploadFile::from_bytes("sample.vcf", SAMPLE_VCF.as_bytes().to_vec());
    let outcome = h.orchestrator.upload(file, true).await.unwrap();
    let content_id = outcome.content_record.unwrap().content_id;

    let stored = h.publisher.fetch(&content_id).await.unwrap();
    let stored = String::from_utf8(stored).unwrap();
    assert!(!stored.contains("VCFv4.2"));

    let plaintext = h.orchestrator.retrieve(&content_id).await.unwrap();
    assert_eq!(plaintext, SAMPLE_VCF);
}

#[tokio::test]
async fn test_retrieve_unknown_content() {
    let h = harness(None, None, MockBackend::default());
    let err = h
        .orchestrator
        .retrieve(&ContentId::from("Qmmockmissing"))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Publish(_)));
}

#[tokio::test]
async fn test_oversized_file_rejected_before_any_stage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.vcf");
    let handle = std::fs::File::create(&path).unwrap();
    handle.set_len(150 * 1024 * 1024).unwrap();

    let h = harness(None, None, MockBackend::default());
    h.attestation.connect_wallet().await.unwrap();

    let file = UploadFile::from_path(&path).await.unwrap();
    let err = h.orchestrator.upload(file, true).await.unwrap_err();

    assert!(matches!(err, UploadError::Validation(_)));
    assert!(h.progress.labels().is_empty());
    assert!(h.backend.calls.lock().is_empty());
}

#[tokio::test]
async fn test_wrong_extension_rejected() {
    let h = harness(None, None, MockBackend::default());
    let file = UploadFile::from_bytes("sample.txt", SAMPLE_VCF.as_bytes().to_vec());
    let err = h.orchestrator.upload(file, false).await.unwrap_err();

    assert!(matches!(err, UploadError::Validation(_)));
    assert!(h.progress.labels().is_empty());
}

#[tokio::test]
async fn test_on_chain_requires_connected_wallet() {
    let h = harness(None, None, MockBackend::default());

    let file = UploadFile::from_bytes("sample.vcf", SAMPLE_VCF.as_bytes().to_vec());
    let err = h.orchestrator.upload(file, true).await.unwrap_err();

    assert!(matches!(err, UploadError::NotConnected));
    assert!(!h.progress.labels().contains(&"Reading file..."));
    assert!(h.backend.calls.lock().is_empty());
}

#[tokio::test]
async fn test_attestation_failure_skips_backend() {
    let h = harness(Some("0xcafebabe1234"), None, MockBackend::default());
    h.attestation.connect_wallet().await.unwrap();

    let file = UploadFile::from_bytes("sample.vcf", SAMPLE_VCF.as_bytes().to_vec());
    let err = h.orchestrator.upload(file, true).await.unwrap_err();

    assert!(matches!(err, UploadError::Submission(_)));
    assert!(h.backend.calls.lock().is_empty());
    let stages = h.progress.stages.lock().clone();
    assert_eq!(stages.last(), Some(&UploadStage::Failed));
    assert!(stages.contains(&UploadStage::Attesting));
    assert!(!stages.contains(&UploadStage::SendingToBackend));
}

#[tokio::test]
async fn test_unconfirmed_transaction_times_out() {
    let h = harness(Some("0xcafebabe1234"), Some("0xfeed"), MockBackend::default());
    h.attestation.connect_wallet().await.unwrap();

    let file = UploadFile::from_bytes("sample.vcf", SAMPLE_VCF.as_bytes().to_vec());
    let err = h.orchestrator.upload(file, true).await.unwrap_err();

    match err {
        UploadError::ConfirmationTimeout { hash, .. } => assert_eq!(hash, "0xfeed"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.backend.calls.lock().is_empty());
}

#[tokio::test]
async fn test_traditional_upload_sends_raw_file() {
    let h = harness(None, None, MockBackend::default());

    let file = UploadFile::from_bytes("sample.vcf", SAMPLE_VCF.as_bytes().to_vec());
    let outcome = h.orchestrator.upload(file, false).await.unwrap();

    assert_eq!(outcome.analysis_id, "analysis-42");
    assert!(!outcome.on_chain);
    assert!(!outcome.is_mock());
    assert!(outcome.content_record.is_none());
    assert_eq!(
        h.progress.labels(),
        vec!["Sending to analysis pipeline...", "Complete!"]
    );

    let calls = h.backend.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].contents, SAMPLE_VCF.as_bytes());
    assert!(calls[0].attestation.is_none());
}

#[tokio::test]
async fn test_backend_failure_marks_session_failed() {
    let backend = MockBackend {
        fail: true,
        ..MockBackend::default()
    };
    let h = harness(None, None, backend);

    let file = UploadFile::from_bytes("sample.vcf", SAMPLE_VCF.as_bytes().to_vec());
    let err = h.orchestrator.upload(file, false).await.unwrap_err();

    assert!(matches!(err, UploadError::Backend(msg) if msg.contains("analysis queue unavailable")));
    assert_eq!(
        h.progress.stages.lock().last(),
        Some(&UploadStage::Failed)
    );
}

#[tokio::test]
async fn test_non_utf8_input_rejected_on_chain() {
    let h = harness(None, None, MockBackend::default());
    h.attestation.connect_wallet().await.unwrap();

    let file = UploadFile::from_bytes("sample.vcf", vec![0xff, 0xfe, 0x00]);
    let err = h.orchestrator.upload(file, true).await.unwrap_err();

    assert!(matches!(err, UploadError::Validation(_)));
    assert!(h.backend.calls.lock().is_empty());
}
