//! Aptos node REST client (v1 API) and devnet faucet.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::errors::*;
use crate::types::{
    AccountInfo, AccountResource, EntryFunctionPayload, GasSettings, LedgerTransaction,
    SimulationOutcome, ViewRequest, WalletAccount,
};
use crate::wallet::{map_api_error, map_response, parse_base_url};

pub const DEFAULT_NODE_URL: &str = "https://fullnode.devnet.aptoslabs.com";
pub const DEFAULT_FAUCET_URL: &str = "https://faucet.devnet.aptoslabs.com";

/// Read and simulation access to the ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// `None` while the node does not know the hash yet.
    async fn transaction_by_hash(&self, hash: &str) -> Result<Option<LedgerTransaction>>;

    async fn view(&self, request: &ViewRequest) -> Result<Vec<Value>>;

    async fn account(&self, address: &str) -> Result<AccountInfo>;

    async fn account_resources(&self, address: &str) -> Result<Vec<AccountResource>>;

    async fn simulate(
        &self,
        sender: &WalletAccount,
        payload: &EntryFunctionPayload,
        gas: &GasSettings,
    ) -> Result<SimulationOutcome>;

    /// Mint `amount` octas to `address`; returns the faucet's transaction hashes.
    async fn fund_account(&self, address: &str, amount: u64) -> Result<Vec<String>>;
}

#[derive(Clone)]
pub struct AptosRestClient {
    base_url: Url,
    faucet_url: Option<Url>,
    http: Client,
}

impl AptosRestClient {
    /// `node_url` may omit the `/v1` suffix.
    pub fn new(node_url: impl AsRef<str>) -> Result<Self> {
        Self::with_http_client(
            node_url,
            Client::builder().timeout(Duration::from_secs(30)).build()?,
        )
    }

    pub fn with_http_client(node_url: impl AsRef<str>, http: Client) -> Result<Self> {
        let mut url = parse_base_url(node_url.as_ref())?;
        if !url.path().ends_with("/v1/") {
            url = url.join("v1/")?;
        }
        Ok(Self {
            base_url: url,
            faucet_url: None,
            http,
        })
    }

    pub fn with_faucet(mut self, faucet_url: impl AsRef<str>) -> Result<Self> {
        self.faucet_url = Some(parse_base_url(faucet_url.as_ref())?);
        Ok(self)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        let response = self.http.get(url).send().await?;
        map_response(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        let response = self.http.post(url).json(body).send().await?;
        map_response(response).await
    }
}

#[async_trait]
impl LedgerClient for AptosRestClient {
    async fn transaction_by_hash(&self, hash: &str) -> Result<Option<LedgerTransaction>> {
        let url = self.base_url.join(&format!("transactions/by_hash/{hash}"))?;
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        map_response(response).await.map(Some)
    }

    async fn view(&self, request: &ViewRequest) -> Result<Vec<Value>> {
        debug!(function = %request.function, "Calling view function");
        self.post_json("view", request).await
    }

    async fn account(&self, address: &str) -> Result<AccountInfo> {
        self.get_json(&format!("accounts/{address}")).await
    }

    async fn account_resources(&self, address: &str) -> Result<Vec<AccountResource>> {
        self.get_json(&format!("accounts/{address}/resources")).await
    }

    async fn simulate(
        &self,
        sender: &WalletAccount,
        payload: &EntryFunctionPayload,
        gas: &GasSettings,
    ) -> Result<SimulationOutcome> {
        let account = self.account(&sender.address).await?;
        let public_key = sender.public_key.clone().ok_or_else(|| {
            LedgerError::parse_error("wallet account exposes no public key for simulation")
        })?;

        // The simulate endpoint rejects valid signatures.
        let request = json!({
            "sender": sender.address,
            "sequence_number": account.sequence_number,
            "max_gas_amount": gas.max_gas_amount.to_string(),
            "gas_unit_price": gas.gas_unit_price.to_string(),
            "expiration_timestamp_secs": (Utc::now().timestamp() + 600).to_string(),
            "payload": payload,
            "signature": {
                "type": "ed25519_signature",
                "public_key": public_key,
                "signature": format!("0x{}", "0".repeat(128)),
            },
        });

        let outcomes: Vec<SimulationOutcome> =
            self.post_json("transactions/simulate", &request).await?;
        outcomes
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::parse_error("empty simulation response"))
    }

    async fn fund_account(&self, address: &str, amount: u64) -> Result<Vec<String>> {
        let faucet = self
            .faucet_url
            .as_ref()
            .ok_or_else(|| LedgerError::InvalidBaseUrl("faucet URL not configured".into()))?;
        let mut url = faucet.join("mint")?;
        url.query_pairs_mut()
            .append_pair("amount", &amount.to_string())
            .append_pair("address", address);

        let response = self.http.post(url).send().await?;
        if !response.status().is_success() {
            return Err(map_api_error(response).await);
        }
        Ok(response.json::<Vec<String>>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_suffix_is_added_once() {
        let client = AptosRestClient::new(DEFAULT_NODE_URL).unwrap();
        assert_eq!(
            client.base_url().as_str(),
            "https://fullnode.devnet.aptoslabs.com/v1/"
        );

        let client = AptosRestClient::new("https://fullnode.devnet.aptoslabs.com/v1").unwrap();
        assert_eq!(
            client.base_url().as_str(),
            "https://fullnode.devnet.aptoslabs.com/v1/"
        );
    }

    #[test]
    fn test_endpoint_paths() {
        let client = AptosRestClient::new(DEFAULT_NODE_URL).unwrap();
        assert_eq!(
            client
                .base_url()
                .join("transactions/by_hash/0xabc")
                .unwrap()
                .as_str(),
            "https://fullnode.devnet.aptoslabs.com/v1/transactions/by_hash/0xabc"
        );
    }

    #[tokio::test]
    async fn test_fund_without_faucet() {
        let client = AptosRestClient::new(DEFAULT_NODE_URL).unwrap();
        assert!(matches!(
            client.fund_account("0x1", 1).await,
            Err(LedgerError::InvalidBaseUrl(_))
        ));
    }
}
