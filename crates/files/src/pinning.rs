//! Pinning service client (Pinata REST API).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use genomeguard_types::{normalize_base_url, ContentId};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::errors::*;

pub const DEFAULT_PINNING_API_URL: &str = "https://api.pinata.cloud";

/// File name the ciphertext is uploaded under.
pub const UPLOAD_FILE_NAME: &str = "encrypted_data.enc";

/// `pinataMetadata` form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinataMetadata {
    pub name: String,
    pub keyvalues: BTreeMap<String, String>,
}

/// Response of `pinFileToIPFS`.
#[derive(Debug, Clone, Deserialize)]
pub struct PinnedFile {
    #[serde(rename = "IpfsHash")]
    pub ipfs_hash: String,
    #[serde(rename = "PinSize", default)]
    pub pin_size: u64,
    #[serde(rename = "Timestamp", default)]
    pub timestamp: Option<String>,
}

impl PinnedFile {
    /// Service timestamp, or now when absent or unparseable.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }
}

/// One row of `data/pinList`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinMetadata {
    pub ipfs_pin_hash: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub date_pinned: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PinListResponse {
    #[serde(default)]
    rows: Vec<PinMetadata>,
}

#[derive(Debug, Serialize)]
struct PinByHashRequest<'a> {
    #[serde(rename = "hashToPin")]
    hash_to_pin: &'a str,
}

/// Remote service that keeps blobs pinned on the content-addressed network.
#[async_trait]
pub trait PinningService: Send + Sync {
    async fn pin_file(&self, blob: Vec<u8>, metadata: &PinataMetadata) -> Result<PinnedFile>;

    async fn pin_by_hash(&self, content_id: &ContentId) -> Result<()>;

    async fn pin_list(&self, content_id: &ContentId) -> Result<Option<PinMetadata>>;
}

#[derive(Clone)]
pub struct PinataClient {
    base_url: Url,
    http: Client,
    api_key: String,
    secret_key: String,
}

impl PinataClient {
    pub fn new(
        api_url: impl AsRef<str>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Self::with_http_client(api_url, api_key, secret_key, http)
    }

    pub fn with_http_client(
        api_url: impl AsRef<str>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        http: Client,
    ) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(api_url.as_ref())?,
            http,
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("pinata_api_key", &self.api_key)
            .header("pinata_secret_api_key", &self.secret_key)
    }
}

#[async_trait]
impl PinningService for PinataClient {
    async fn pin_file(&self, blob: Vec<u8>, metadata: &PinataMetadata) -> Result<PinnedFile> {
        let url = self.base_url.join("pinning/pinFileToIPFS")?;
        let metadata_json =
            serde_json::to_string(metadata).map_err(|e| PublishError::Parse(e.to_string()))?;

        let file = Part::bytes(blob)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("text/plain")?;
        let form = Form::new()
            .part("file", file)
            .text("pinataMetadata", metadata_json);

        debug!(%url, name = %metadata.name, "Pinning file");
        let response = self
            .authorized(self.http.post(url))
            .multipart(form)
            .send()
            .await?;
        map_response(response).await
    }

    async fn pin_by_hash(&self, content_id: &ContentId) -> Result<()> {
        let url = self.base_url.join("pinning/pinByHash")?;
        let body = PinByHashRequest {
            hash_to_pin: content_id.as_str(),
        };
        let response = self
            .authorized(self.http.post(url))
            .json(&body)
            .send()
            .await?;
        map_response::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn pin_list(&self, content_id: &ContentId) -> Result<Option<PinMetadata>> {
        let mut url = self.base_url.join("data/pinList")?;
        url.query_pairs_mut()
            .append_pair("hashContains", content_id.as_str());

        let response = self.authorized(self.http.get(url)).send().await?;
        let list: PinListResponse = map_response(response).await?;
        Ok(list.rows.into_iter().next())
    }
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    normalize_base_url(raw).map_err(|_| PublishError::InvalidBaseUrl(raw.to_string()))
}

pub(crate) async fn map_response<T>(response: Response) -> Result<T>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = if text.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            text
        };
        return Err(PublishError::server_error(status.as_u16(), message));
    }
    Ok(response.json::<T>().await?)
}
