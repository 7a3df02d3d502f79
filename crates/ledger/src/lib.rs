//! GenomeGuard ledger attestation
//!
//! Wallet providers sign transactions, an Aptos REST client reads the chain,
//! and [`AttestationClient`] ties both together to anchor content identifiers
//! in the `privacy_analysis` contract.

pub mod attestation;
pub mod errors;
pub mod rest;
pub mod types;
pub mod wallet;

pub use attestation::{
    is_contract_configured, AttestationClient, AttestationConfig, AttestationPhase,
    DEFAULT_MODULE_NAME, FAUCET_AMOUNT_OCTAS,
};
pub use errors::{LedgerError, Result};
pub use rest::{AptosRestClient, LedgerClient, DEFAULT_FAUCET_URL, DEFAULT_NODE_URL};
pub use types::{
    AccountInfo, AccountResource, EntryFunctionPayload, GasSettings, LedgerTransaction,
    PendingTransaction, SimulationOutcome, SimulationPolicy, TransactionEvent, ViewRequest,
    WalletAccount, APTOS_COIN_STORE, OCTAS_PER_APT,
};
pub use wallet::{HttpWalletProvider, WalletProvider, WalletRegistry, WalletSlot};
