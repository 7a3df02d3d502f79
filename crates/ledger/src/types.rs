//! Wire types shared by the wallet bridge and the ledger REST client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Resource type of the native coin balance.
pub const APTOS_COIN_STORE: &str = "0x1::coin::CoinStore<0x1::aptos_coin::AptosCoin>";

/// Octas per APT.
pub const OCTAS_PER_APT: u64 = 100_000_000;

/// Event emitted by `request_analysis`.
pub const ANALYSIS_REQUESTED_EVENT: &str = "AnalysisRequestedEvent";

/// Account exposed by a connected wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub address: String,
    #[serde(rename = "publicKey", alias = "public_key", default)]
    pub public_key: Option<String>,
}

/// Wallet response to a sign-and-submit request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    #[serde(default)]
    pub hash: Option<String>,
}

/// `entry_function_payload` as accepted by wallets and the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFunctionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
}

impl EntryFunctionPayload {
    pub fn new(function: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            kind: "entry_function_payload".to_string(),
            function: function.into(),
            type_arguments: Vec::new(),
            arguments,
        }
    }
}

/// Body of `POST /view`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRequest {
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
}

impl ViewRequest {
    pub fn new(function: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            type_arguments: Vec::new(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

/// Transaction as returned by `GET /transactions/by_hash/{hash}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    #[serde(rename = "type")]
    pub kind: String,
    pub hash: String,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub vm_status: Option<String>,
    #[serde(default)]
    pub events: Vec<TransactionEvent>,
}

impl LedgerTransaction {
    pub fn is_pending(&self) -> bool {
        self.kind == "pending_transaction"
    }

    /// `analysis_id` of the first analysis-request event, string or numeric.
    pub fn analysis_id(&self) -> Option<u64> {
        self.events
            .iter()
            .find(|event| event.event_type.contains(ANALYSIS_REQUESTED_EVENT))
            .and_then(|event| event.data.get("analysis_id"))
            .and_then(value_as_u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub data: Value,
}

/// `GET /accounts/{addr}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub sequence_number: String,
    #[serde(default)]
    pub authentication_key: Option<String>,
}

/// Octas held in the coin store, if the account has one.
pub fn coin_balance_octas(resources: &[AccountResource]) -> Option<u64> {
    resources
        .iter()
        .find(|r| r.resource_type == APTOS_COIN_STORE)
        .and_then(|r| r.data.get("coin"))
        .and_then(|coin| coin.get("value"))
        .and_then(value_as_u64)
}

/// Move `u64` values arrive as JSON strings; smaller integers as numbers.
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Gas limits used for simulation and forwarded to the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasSettings {
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            max_gas_amount: 100_000,
            gas_unit_price: 100,
        }
    }
}

/// Whether a transaction is dry-run before the wallet is asked to sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationPolicy {
    /// Submit straight to the wallet.
    #[default]
    Skip,
    /// Simulate; log failures and submit anyway.
    Advisory,
    /// Simulate; abort the submission on failure.
    Enforce,
}

impl FromStr for SimulationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(SimulationPolicy::Skip),
            "advisory" => Ok(SimulationPolicy::Advisory),
            "enforce" => Ok(SimulationPolicy::Enforce),
            other => Err(format!("unknown simulation policy `{other}`")),
        }
    }
}

impl fmt::Display for SimulationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SimulationPolicy::Skip => "skip",
            SimulationPolicy::Advisory => "advisory",
            SimulationPolicy::Enforce => "enforce",
        })
    }
}

/// Result of `POST /transactions/simulate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub success: bool,
    #[serde(default)]
    pub vm_status: String,
    #[serde(default)]
    pub gas_used: String,
}
