//! Layered configuration: built-in defaults, an optional TOML file, then
//! `GENOMEGUARD_*` environment variables (`__` separates sections, e.g.
//! `GENOMEGUARD_PINNING__API_KEY`).

use config::{Config, Environment, File};
use genomeguard_files::{
    DEFAULT_FALLBACK_QUOTA_BYTES, DEFAULT_GATEWAY_URL, DEFAULT_PINNING_API_URL, PUBLIC_GATEWAY_URL,
};
use genomeguard_ledger::{
    AttestationConfig, GasSettings, SimulationPolicy, DEFAULT_FAUCET_URL, DEFAULT_MODULE_NAME,
    DEFAULT_NODE_URL,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "GENOMEGUARD";
pub const CONFIG_FILE_NAME: &str = "genomeguard.toml";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    /// `json` for single-line output, anything else for the pretty layer.
    pub log_format: String,
    pub backend: BackendSettings,
    pub pinning: PinningSettings,
    pub ledger: LedgerSettings,
    pub wallet: WalletSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinningSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub gateway_url: String,
    pub public_gateway_url: String,
    pub fallback_quota_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub node_url: String,
    pub faucet_url: String,
    pub contract_address: Option<String>,
    pub module_name: String,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
    pub simulation: SimulationPolicy,
    pub simulation_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletSettings {
    pub primary_url: Option<String>,
    pub secondary_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            backend: BackendSettings::default(),
            pinning: PinningSettings::default(),
            ledger: LedgerSettings::default(),
            wallet: WalletSettings::default(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for PinningSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_PINNING_API_URL.to_string(),
            api_key: None,
            secret_key: None,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            public_gateway_url: PUBLIC_GATEWAY_URL.to_string(),
            fallback_quota_bytes: DEFAULT_FALLBACK_QUOTA_BYTES,
        }
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        let gas = GasSettings::default();
        Self {
            node_url: DEFAULT_NODE_URL.to_string(),
            faucet_url: DEFAULT_FAUCET_URL.to_string(),
            contract_address: None,
            module_name: DEFAULT_MODULE_NAME.to_string(),
            confirmation_timeout_secs: 60,
            poll_interval_ms: 1000,
            max_gas_amount: gas.max_gas_amount,
            gas_unit_price: gas.gas_unit_price,
            simulation: SimulationPolicy::Skip,
            simulation_timeout_secs: 10,
        }
    }
}

/// `GENOMEGUARD_*` variables. Values stay strings until typed fields are
/// deserialized, so numeric-looking secrets keep their exact text.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

/// `<platform data dir>/genomeguard`, or `./.genomeguard` when unknown.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("genomeguard"))
        .unwrap_or_else(|| PathBuf::from(".genomeguard"))
}

impl AppConfig {
    /// Load from `path` if given (it must exist), else from
    /// `<default data dir>/genomeguard.toml` when present, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let resolved = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(config::ConfigError::Message(format!(
                        "Configuration file {} not found",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => {
                let candidate = default_data_dir().join(CONFIG_FILE_NAME);
                candidate.exists().then_some(candidate)
            }
        };

        Self::from_sources(resolved.as_deref(), environment())
    }

    fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        builder.add_source(env).build()?.try_deserialize()
    }

    /// Location of the shared sled database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    /// Both pinning credentials, when both are set and non-empty.
    pub fn pinning_credentials(&self) -> Option<(String, String)> {
        let key = self.pinning.api_key.as_deref().filter(|k| !k.is_empty())?;
        let secret = self.pinning.secret_key.as_deref().filter(|s| !s.is_empty())?;
        Some((key.to_string(), secret.to_string()))
    }

    pub fn attestation_config(&self) -> AttestationConfig {
        AttestationConfig {
            contract_address: self
                .ledger
                .contract_address
                .clone()
                .filter(|address| !address.is_empty()),
            module_name: self.ledger.module_name.clone(),
            confirmation_timeout: Duration::from_secs(self.ledger.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(self.ledger.poll_interval_ms),
            gas: GasSettings {
                max_gas_amount: self.ledger.max_gas_amount,
                gas_unit_price: self.ledger.gas_unit_price,
            },
            simulation: self.ledger.simulation,
            simulation_timeout: Duration::from_secs(self.ledger.simulation_timeout_secs),
        }
    }
}
