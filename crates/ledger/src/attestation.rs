//! Anchoring content identifiers on the ledger.
//!
//! Each request walks `Idle -> WalletChecked -> TransactionBuilt -> Submitted
//! -> Confirmed`, dropping to `Failed` from any step. While the contract is
//! not deployed every request short-circuits to a synthetic record.

use chrono::Utc;
use genomeguard_types::{AnalysisStatus, AttestationRecord, ContentId};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::errors::*;
use crate::rest::LedgerClient;
use crate::types::{
    coin_balance_octas, value_as_u64, EntryFunctionPayload, GasSettings, LedgerTransaction,
    SimulationPolicy, ViewRequest, WalletAccount, OCTAS_PER_APT,
};
use crate::wallet::{WalletProvider, WalletRegistry, WalletSlot};

pub const DEFAULT_MODULE_NAME: &str = "privacy_analysis";

/// Placeholder shipped in sample configuration.
const CONTRACT_PLACEHOLDER: &str = "0x...";

/// Amount requested from the faucet: 1 APT.
pub const FAUCET_AMOUNT_OCTAS: u64 = OCTAS_PER_APT;

/// Whether `address` names a deployed contract.
pub fn is_contract_configured(address: Option<&str>) -> bool {
    match address {
        Some(address) => address != CONTRACT_PLACEHOLDER && address.len() >= 10,
        None => false,
    }
}

#[derive(Debug, Clone)]
pub struct AttestationConfig {
    pub contract_address: Option<String>,
    pub module_name: String,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub gas: GasSettings,
    pub simulation: SimulationPolicy,
    /// Upper bound for a single simulation call.
    pub simulation_timeout: Duration,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            contract_address: None,
            module_name: DEFAULT_MODULE_NAME.to_string(),
            confirmation_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(1000),
            gas: GasSettings::default(),
            simulation: SimulationPolicy::Skip,
            simulation_timeout: Duration::from_secs(10),
        }
    }
}

impl AttestationConfig {
    pub fn is_contract_configured(&self) -> bool {
        is_contract_configured(self.contract_address.as_deref())
    }

    /// Fully qualified `<address>::<module>::<function>`.
    pub fn function_id(&self, function: &str) -> Result<String> {
        if !self.is_contract_configured() {
            return Err(LedgerError::ContractNotConfigured);
        }
        let address = self.contract_address.as_deref().unwrap_or_default();
        Ok(format!("{address}::{}::{function}", self.module_name))
    }
}

/// Progress of a single attestation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationPhase {
    Idle,
    WalletChecked,
    TransactionBuilt,
    Submitted,
    Confirmed,
    Failed,
}

impl AttestationPhase {
    pub fn can_transition_to(self, next: AttestationPhase) -> bool {
        use AttestationPhase::*;
        matches!(
            (self, next),
            (Idle, WalletChecked)
                | (WalletChecked, TransactionBuilt)
                | (TransactionBuilt, Submitted)
                | (Submitted, Confirmed)
                | (Idle | WalletChecked | TransactionBuilt | Submitted, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AttestationPhase::Confirmed | AttestationPhase::Failed)
    }
}

impl fmt::Display for AttestationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttestationPhase::Idle => "idle",
            AttestationPhase::WalletChecked => "wallet_checked",
            AttestationPhase::TransactionBuilt => "transaction_built",
            AttestationPhase::Submitted => "submitted",
            AttestationPhase::Confirmed => "confirmed",
            AttestationPhase::Failed => "failed",
        })
    }
}

/// Phase tracker for one request.
struct PhaseTracker<'a> {
    phase: AttestationPhase,
    last: &'a RwLock<AttestationPhase>,
}

impl<'a> PhaseTracker<'a> {
    fn start(last: &'a RwLock<AttestationPhase>) -> Self {
        *last.write() = AttestationPhase::Idle;
        Self {
            phase: AttestationPhase::Idle,
            last,
        }
    }

    fn advance(&mut self, next: AttestationPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal attestation transition {} -> {}",
            self.phase,
            next
        );
        debug!(from = %self.phase, to = %next, "Attestation phase");
        self.phase = next;
        *self.last.write() = next;
    }

    fn fail(&mut self, err: LedgerError) -> LedgerError {
        error!(phase = %self.phase, error = %err, "Attestation failed");
        self.advance(AttestationPhase::Failed);
        err
    }
}

/// Wallet currently bound to the client.
#[derive(Clone)]
struct ConnectedWallet {
    slot: WalletSlot,
    provider: Arc<dyn WalletProvider>,
    account: WalletAccount,
}

/// Submits and reads analysis attestations through a wallet and a ledger node.
pub struct AttestationClient {
    config: AttestationConfig,
    wallets: WalletRegistry,
    ledger: Arc<dyn LedgerClient>,
    connected: RwLock<Option<ConnectedWallet>>,
    last_phase: RwLock<AttestationPhase>,
}

impl AttestationClient {
    pub fn new(
        config: AttestationConfig,
        wallets: WalletRegistry,
        ledger: Arc<dyn LedgerClient>,
    ) -> Self {
        Self {
            config,
            wallets,
            ledger,
            connected: RwLock::new(None),
            last_phase: RwLock::new(AttestationPhase::Idle),
        }
    }

    pub fn config(&self) -> &AttestationConfig {
        &self.config
    }

    /// Phase reached by the most recent real attestation request.
    pub fn last_phase(&self) -> AttestationPhase {
        *self.last_phase.read()
    }

    /// Resolve a wallet provider and connect to it.
    pub async fn connect_wallet(&self) -> Result<WalletAccount> {
        let (slot, provider) = self.wallets.resolve().await;
        let provider = provider.ok_or(LedgerError::NoWalletFound)?;

        let account = provider.connect().await?;
        info!(%slot, wallet = provider.name(), address = %account.address, "Connected wallet");

        *self.connected.write() = Some(ConnectedWallet {
            slot,
            provider,
            account: account.clone(),
        });
        Ok(account)
    }

    pub async fn disconnect_wallet(&self) -> Result<()> {
        let connected = self.connected.write().take();
        if let Some(wallet) = connected {
            wallet.provider.disconnect().await?;
            info!(slot = %wallet.slot, "Disconnected wallet");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.read().is_some()
    }

    pub fn connected_slot(&self) -> WalletSlot {
        self.connected
            .read()
            .as_ref()
            .map(|w| w.slot)
            .unwrap_or(WalletSlot::Absent)
    }

    /// Account recorded at connect time.
    pub fn connected_account(&self) -> Option<WalletAccount> {
        self.connected.read().as_ref().map(|w| w.account.clone())
    }

    fn connected_wallet(&self) -> Result<ConnectedWallet> {
        self.connected
            .read()
            .clone()
            .ok_or(LedgerError::NotConnected)
    }

    /// Anchor `content_id` on the ledger.
    pub async fn request_attestation(&self, content_id: &ContentId) -> Result<AttestationRecord> {
        if !self.config.is_contract_configured() {
            warn!(%content_id, "Attestation contract not deployed, using mock attestation");
            return Ok(AttestationRecord::mock(Utc::now().timestamp_millis()));
        }

        let mut tracker = PhaseTracker::start(&self.last_phase);

        let wallet = match self.connected_wallet() {
            Ok(wallet) => wallet,
            Err(e) => return Err(tracker.fail(e)),
        };
        let account = match wallet.provider.account().await {
            Ok(Some(account)) => account,
            Ok(None) => return Err(tracker.fail(LedgerError::NotConnected)),
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.advance(AttestationPhase::WalletChecked);

        let payload = match self.config.function_id("request_analysis") {
            Ok(function) => EntryFunctionPayload::new(function, vec![json!(content_id.as_str())]),
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.advance(AttestationPhase::TransactionBuilt);

        if let Err(e) = self.run_simulation(&account, &payload).await {
            return Err(tracker.fail(e));
        }

        let hash = match self.submit(&wallet, &payload).await {
            Ok(hash) => hash,
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.advance(AttestationPhase::Submitted);
        info!(%content_id, tx_hash = %hash, "Attestation submitted");

        let txn = match self.wait_for_transaction(&hash).await {
            Ok(txn) => txn,
            Err(e) => return Err(tracker.fail(e)),
        };
        if txn.success == Some(false) {
            let status = txn.vm_status.unwrap_or_else(|| "unknown".to_string());
            return Err(tracker.fail(LedgerError::Submission(format!(
                "transaction {hash} aborted: {status}"
            ))));
        }

        let analysis_id = txn.analysis_id();
        tracker.advance(AttestationPhase::Confirmed);
        info!(%content_id, tx_hash = %hash, ?analysis_id, "Attestation confirmed");

        Ok(AttestationRecord::confirmed(hash, analysis_id))
    }

    async fn run_simulation(
        &self,
        account: &WalletAccount,
        payload: &EntryFunctionPayload,
    ) -> Result<()> {
        let policy = self.config.simulation;
        if policy == SimulationPolicy::Skip {
            return Ok(());
        }

        let outcome = tokio::time::timeout(
            self.config.simulation_timeout,
            self.ledger.simulate(account, payload, &self.config.gas),
        )
        .await;

        let failure = match outcome {
            Ok(Ok(sim)) if sim.success => {
                debug!(gas_used = %sim.gas_used, "Simulation succeeded");
                return Ok(());
            }
            Ok(Ok(sim)) => format!("simulation failed: {}", sim.vm_status),
            Ok(Err(e)) => format!("simulation error: {e}"),
            Err(_) => format!(
                "simulation timed out after {}s",
                self.config.simulation_timeout.as_secs()
            ),
        };

        match policy {
            SimulationPolicy::Enforce => Err(LedgerError::Submission(failure)),
            _ => {
                warn!(%failure, "Proceeding despite simulation failure");
                Ok(())
            }
        }
    }

    async fn submit(
        &self,
        wallet: &ConnectedWallet,
        payload: &EntryFunctionPayload,
    ) -> Result<String> {
        let pending = wallet
            .provider
            .sign_and_submit_transaction(payload, &self.config.gas)
            .await?;
        match pending.hash {
            Some(hash) if !hash.is_empty() => Ok(hash),
            _ => Err(LedgerError::Submission(
                "Failed to get transaction hash".to_string(),
            )),
        }
    }

    /// Poll until `hash` leaves the pending state or the deadline passes.
    pub async fn wait_for_transaction(&self, hash: &str) -> Result<LedgerTransaction> {
        let deadline = self.config.confirmation_timeout;
        let poll = async {
            loop {
                match self.ledger.transaction_by_hash(hash).await? {
                    Some(txn) if !txn.is_pending() => return Ok::<_, LedgerError>(txn),
                    _ => tokio::time::sleep(self.config.poll_interval).await,
                }
            }
        };

        match tokio::time::timeout(deadline, poll).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::ConfirmationTimeout {
                hash: hash.to_string(),
                waited_secs: deadline.as_secs(),
            }),
        }
    }

    async fn view_first(&self, function: &str, arguments: Vec<Value>) -> Result<Value> {
        let request = ViewRequest::new(self.config.function_id(function)?, arguments);
        self.ledger
            .view(&request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::parse_error(format!("{function} returned no values")))
    }

    pub async fn get_status(&self, analysis_id: u64) -> Result<AnalysisStatus> {
        let value = self
            .view_first("get_analysis_status", vec![json!(analysis_id.to_string())])
            .await?;
        Ok(value_as_u64(&value)
            .map(AnalysisStatus::from_code)
            .unwrap_or(AnalysisStatus::Unknown))
    }

    /// Content id of the encrypted result, as recorded by the operator.
    pub async fn get_encrypted_result(&self, analysis_id: u64) -> Result<Option<ContentId>> {
        let value = self
            .view_first("get_encrypted_result", vec![json!(analysis_id.to_string())])
            .await?;
        Ok(value
            .as_str()
            .filter(|s| !s.is_empty())
            .map(ContentId::from))
    }

    pub async fn get_total_analyses(&self) -> Result<u64> {
        let value = self.view_first("get_total_analyses", Vec::new()).await?;
        value_as_u64(&value)
            .ok_or_else(|| LedgerError::parse_error(format!("unexpected total: {value}")))
    }

    /// Record the result of an analysis; signed by the connected wallet.
    pub async fn submit_results(
        &self,
        analysis_id: u64,
        result_content_id: &ContentId,
    ) -> Result<String> {
        let wallet = self.connected_wallet()?;
        let payload = EntryFunctionPayload::new(
            self.config.function_id("submit_results")?,
            vec![
                json!(analysis_id.to_string()),
                json!(result_content_id.as_str()),
            ],
        );

        let hash = self.submit(&wallet, &payload).await?;
        let txn = self.wait_for_transaction(&hash).await?;
        if txn.success == Some(false) {
            return Err(LedgerError::Submission(format!(
                "transaction {hash} aborted: {}",
                txn.vm_status.unwrap_or_default()
            )));
        }
        info!(analysis_id, tx_hash = %hash, "Results submitted");
        Ok(hash)
    }

    /// Native coin balance in APT.
    pub async fn get_balance(&self, address: &str) -> Result<f64> {
        let resources = self.ledger.account_resources(address).await?;
        let octas = coin_balance_octas(&resources).unwrap_or(0);
        Ok(octas as f64 / OCTAS_PER_APT as f64)
    }

    /// Request 1 APT from the devnet faucet and wait for the mint.
    pub async fn fund_account(&self, address: &str) -> Result<()> {
        let hashes = self
            .ledger
            .fund_account(address, FAUCET_AMOUNT_OCTAS)
            .await?;
        for hash in &hashes {
            self.wait_for_transaction(hash).await?;
        }
        info!(%address, "Account funded from faucet");
        Ok(())
    }
}
