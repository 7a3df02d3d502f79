//! Read-only HTTP gateways onto the content-addressed network.

use async_trait::async_trait;
use genomeguard_types::ContentId;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::errors::*;
use crate::pinning::parse_base_url;

pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud";
pub const PUBLIC_GATEWAY_URL: &str = "https://ipfs.io";

#[async_trait]
pub trait ContentGateway: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn fetch(&self, content_id: &ContentId) -> Result<Vec<u8>>;
}

/// Gateway serving `GET {base}/ipfs/{cid}`.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: Url,
    http: Client,
}

impl HttpGateway {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            base_url: parse_base_url(base_url.as_ref())?,
            http,
        })
    }

    pub fn content_url(&self, content_id: &ContentId) -> Result<Url> {
        Ok(self.base_url.join(&format!("ipfs/{content_id}"))?)
    }
}

#[async_trait]
impl ContentGateway for HttpGateway {
    fn name(&self) -> &str {
        self.base_url.host_str().unwrap_or("gateway")
    }

    async fn fetch(&self, content_id: &ContentId) -> Result<Vec<u8>> {
        let url = self.content_url(content_id)?;
        debug!(%url, "Fetching from gateway");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::server_error(
                status.as_u16(),
                status.canonical_reason().unwrap_or("gateway request failed"),
            ));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_url() {
        let gateway = HttpGateway::new("https://ipfs.io").unwrap();
        let url = gateway.content_url(&ContentId::from("QmAbc")).unwrap();
        assert_eq!(url.as_str(), "https://ipfs.io/ipfs/QmAbc");
        assert_eq!(gateway.name(), "ipfs.io");
    }

    #[test]
    fn test_content_url_keeps_base_path() {
        let gateway = HttpGateway::new("http://localhost:8080/proxy").unwrap();
        let url = gateway.content_url(&ContentId::from("QmAbc")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/proxy/ipfs/QmAbc");
    }
}
