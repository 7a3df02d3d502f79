//! Long-lived services shared by every upload of a process.

use genomeguard_crypto::{EncryptionEngine, KeyStore};
use genomeguard_files::{
    ContentPublisher, FallbackStore, HttpGateway, PinataClient, PinningPublisher,
};
use genomeguard_ledger::{
    AptosRestClient, AttestationClient, HttpWalletProvider, WalletProvider, WalletRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::backend::{BackendClient, HttpBackendClient};
use crate::config::AppConfig;
use crate::errors::*;

#[derive(Clone)]
pub struct PipelineContext {
    pub keys: Arc<KeyStore>,
    pub engine: EncryptionEngine,
    pub publisher: Arc<dyn ContentPublisher>,
    pub attestation: Arc<AttestationClient>,
    pub backend: Arc<dyn BackendClient>,
}

impl PipelineContext {
    pub fn new(
        keys: Arc<KeyStore>,
        publisher: Arc<dyn ContentPublisher>,
        attestation: Arc<AttestationClient>,
        backend: Arc<dyn BackendClient>,
    ) -> Self {
        Self {
            engine: EncryptionEngine::new(keys.clone()),
            keys,
            publisher,
            attestation,
            backend,
        }
    }

    /// Open the local database and build every service from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            UploadError::Storage(format!(
                "cannot create data directory {}: {e}",
                config.data_dir.display()
            ))
        })?;
        let db = sled::open(config.db_path())?;

        let keys = Arc::new(KeyStore::with_db(db.clone())?);
        let fallback = Arc::new(FallbackStore::with_db(
            db,
            config.pinning.fallback_quota_bytes,
        )?);

        let publisher = Arc::new(build_publisher(config, fallback)?);
        let attestation = Arc::new(build_attestation(config)?);
        let backend = Arc::new(
            HttpBackendClient::new(
                &config.backend.url,
                Duration::from_secs(config.backend.timeout_secs),
            )?,
        );

        Ok(Self::new(keys, publisher, attestation, backend))
    }
}

fn build_publisher(config: &AppConfig, fallback: Arc<FallbackStore>) -> Result<PinningPublisher> {
    let settings = &config.pinning;
    let mut publisher =
        PinningPublisher::new(fallback).with_gateway_base(settings.gateway_url.clone());

    match config.pinning_credentials() {
        Some((key, secret)) => {
            let client = PinataClient::new(&settings.api_url, key, secret)?;
            publisher = publisher.with_pinning(Arc::new(client));
            info!(api_url = %settings.api_url, "Pinning service configured");
        }
        None => warn!("Pinning credentials not configured, uploads use the local fallback store"),
    }

    Ok(publisher
        .with_gateway(Arc::new(HttpGateway::new(&settings.gateway_url)?))
        .with_gateway(Arc::new(HttpGateway::new(&settings.public_gateway_url)?)))
}

fn build_attestation(config: &AppConfig) -> Result<AttestationClient> {
    let ledger = AptosRestClient::new(&config.ledger.node_url)?
        .with_faucet(&config.ledger.faucet_url)?;

    let provider = |name: &str, url: &Option<String>| -> Result<Option<Arc<dyn WalletProvider>>> {
        match url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => {
                let provider: Arc<dyn WalletProvider> = Arc::new(HttpWalletProvider::new(name, url)?);
                Ok(Some(provider))
            }
            None => Ok(None),
        }
    };
    let wallets = WalletRegistry::new(
        provider("primary", &config.wallet.primary_url)?,
        provider("secondary", &config.wallet.secondary_url)?,
    );

    let attestation = config.attestation_config();
    if !attestation.is_contract_configured() {
        warn!("Attestation contract not configured, attestations will be mocked");
    }
    Ok(AttestationClient::new(attestation, wallets, Arc::new(ledger)))
}
