//! Wallet providers and their resolution.
//!
//! A wallet signs and submits transactions on the user's behalf. Two provider
//! slots are checked in order at connect time; the first one that is installed
//! is used for the rest of the session.

use async_trait::async_trait;
use genomeguard_types::normalize_base_url;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::errors::*;
use crate::types::{EntryFunctionPayload, GasSettings, PendingTransaction, WalletAccount};

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Whether the provider is present at all.
    async fn is_installed(&self) -> bool;

    async fn connect(&self) -> Result<WalletAccount>;

    /// Currently authorized account, `None` when the wallet is locked or disconnected.
    async fn account(&self) -> Result<Option<WalletAccount>>;

    async fn disconnect(&self) -> Result<()>;

    async fn sign_and_submit_transaction(
        &self,
        payload: &EntryFunctionPayload,
        gas: &GasSettings,
    ) -> Result<PendingTransaction>;
}

/// Which provider a session resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletSlot {
    Primary,
    Secondary,
    Absent,
}

impl fmt::Display for WalletSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WalletSlot::Primary => "primary",
            WalletSlot::Secondary => "secondary",
            WalletSlot::Absent => "absent",
        })
    }
}

/// The (up to) two wallet providers known to this installation.
#[derive(Clone, Default)]
pub struct WalletRegistry {
    primary: Option<Arc<dyn WalletProvider>>,
    secondary: Option<Arc<dyn WalletProvider>>,
}

impl WalletRegistry {
    pub fn new(
        primary: Option<Arc<dyn WalletProvider>>,
        secondary: Option<Arc<dyn WalletProvider>>,
    ) -> Self {
        Self { primary, secondary }
    }

    /// Probe primary then secondary.
    pub async fn resolve(&self) -> (WalletSlot, Option<Arc<dyn WalletProvider>>) {
        let candidates = [
            (WalletSlot::Primary, &self.primary),
            (WalletSlot::Secondary, &self.secondary),
        ];
        for (slot, provider) in candidates {
            if let Some(provider) = provider {
                if provider.is_installed().await {
                    debug!(%slot, wallet = provider.name(), "Resolved wallet provider");
                    return (slot, Some(provider.clone()));
                }
            }
        }
        (WalletSlot::Absent, None)
    }
}

#[derive(Serialize)]
struct SignAndSubmitRequest<'a> {
    payload: &'a EntryFunctionPayload,
    options: SubmitOptions,
}

#[derive(Serialize)]
struct SubmitOptions {
    max_gas_amount: String,
    gas_unit_price: String,
}

/// Wallet reached through a local HTTP bridge.
///
/// Endpoints: `POST connect`, `GET account`, `POST disconnect`,
/// `POST sign_and_submit`.
#[derive(Clone)]
pub struct HttpWalletProvider {
    name: String,
    base_url: Url,
    http: Client,
}

impl HttpWalletProvider {
    pub fn new(name: impl Into<String>, base_url: impl AsRef<str>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            name: name.into(),
            base_url: parse_base_url(base_url.as_ref())?,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
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
impl WalletProvider for HttpWalletProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_installed(&self) -> bool {
        let Ok(url) = self.base_url.join("account") else {
            return false;
        };
        // Any HTTP answer means the bridge is running.
        self.http
            .get(url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .is_ok()
    }

    async fn connect(&self) -> Result<WalletAccount> {
        let account: WalletAccount = self.post_json("connect", &serde_json::json!({})).await?;
        if account.address.is_empty() {
            return Err(LedgerError::Wallet(format!(
                "Failed to get address from {} wallet",
                self.name
            )));
        }
        info!(wallet = %self.name, address = %account.address, "Wallet connected");
        Ok(account)
    }

    async fn account(&self) -> Result<Option<WalletAccount>> {
        let url = self.base_url.join("account")?;
        let response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED | StatusCode::NO_CONTENT => Ok(None),
            _ => {
                let account: Option<WalletAccount> = map_response(response).await?;
                Ok(account.filter(|a| !a.address.is_empty()))
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        let url = self.base_url.join("disconnect")?;
        let response = self.http.post(url).send().await?;
        if !response.status().is_success() {
            return Err(map_api_error(response).await);
        }
        Ok(())
    }

    async fn sign_and_submit_transaction(
        &self,
        payload: &EntryFunctionPayload,
        gas: &GasSettings,
    ) -> Result<PendingTransaction> {
        let request = SignAndSubmitRequest {
            payload,
            options: SubmitOptions {
                max_gas_amount: gas.max_gas_amount.to_string(),
                gas_unit_price: gas.gas_unit_price.to_string(),
            },
        };
        self.post_json("sign_and_submit", &request)
            .await
            .map_err(|e| match e {
                LedgerError::ServerError { message, .. } => LedgerError::Submission(message),
                other => other,
            })
    }
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    normalize_base_url(raw).map_err(|_| LedgerError::InvalidBaseUrl(raw.to_string()))
}

pub(crate) async fn map_response<T>(response: Response) -> Result<T>
where
    T: DeserializeOwned,
{
    if !response.status().is_success() {
        return Err(map_api_error(response).await);
    }
    Ok(response.json::<T>().await?)
}

#[derive(serde::Deserialize)]
struct ApiErrorResponse {
    #[serde(default, alias = "error_code")]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub(crate) async fn map_api_error(response: Response) -> LedgerError {
    let status = response.status().as_u16();
    let bytes = response.bytes().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_slice::<ApiErrorResponse>(&bytes) {
        return LedgerError::server_error(
            status,
            api_error.code.unwrap_or_else(|| "unknown".into()),
            api_error.message.unwrap_or_else(|| "request failed".into()),
        );
    }
    let text = String::from_utf8_lossy(&bytes).to_string();
    LedgerError::server_error(status, "http_error", text)
}
