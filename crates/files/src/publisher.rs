//! Publishing ciphertext to the content-addressed store.
//!
//! The pinning service is the primary path. When credentials are missing or
//! the service fails for any reason, blobs go to the local
//! [`FallbackStore`] instead and the resulting record is flagged `mock`.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use genomeguard_types::{ContentId, ContentRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::*;
use crate::fallback::FallbackStore;
use crate::gateway::{ContentGateway, DEFAULT_GATEWAY_URL};
use crate::pinning::{PinMetadata, PinataMetadata, PinningService};

/// Pin name used when the caller supplies no file name.
pub const DEFAULT_PIN_NAME: &str = "genomic_data.vcf.enc";

/// Caller-supplied descriptive metadata for a published blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishMetadata {
    pub filename: Option<String>,
    pub entries: BTreeMap<String, String>,
}

impl PublishMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        self.entries.insert("filename".to_string(), filename.clone());
        self.filename = Some(filename);
        self
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.entries.insert(key.into(), value.to_string());
        self
    }

    /// Pinata metadata: fixed tags first, caller entries override them.
    pub fn to_pinata(&self) -> PinataMetadata {
        let mut keyvalues = BTreeMap::new();
        keyvalues.insert("encrypted".to_string(), "true".to_string());
        keyvalues.insert("type".to_string(), "genomic_analysis".to_string());
        keyvalues.insert(
            "timestamp".to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        keyvalues.extend(self.entries.clone());

        PinataMetadata {
            name: self
                .filename
                .clone()
                .unwrap_or_else(|| DEFAULT_PIN_NAME.to_string()),
            keyvalues,
        }
    }
}

/// Result of a pin request. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinOutcome {
    pub pinned: bool,
    pub message: String,
}

impl PinOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            pinned: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            pinned: false,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ContentPublisher: Send + Sync {
    /// Publish `blob`. Only fails when the local fallback fails too.
    async fn publish(&self, blob: &[u8], metadata: PublishMetadata) -> Result<ContentRecord>;

    async fn fetch(&self, content_id: &ContentId) -> Result<Vec<u8>>;

    async fn pin(&self, content_id: &ContentId) -> PinOutcome;

    /// Pinning service record for `content_id`, if one can be obtained.
    async fn metadata(&self, content_id: &ContentId) -> Option<PinMetadata>;

    fn is_configured(&self) -> bool;
}

/// Publisher backed by a pinning service, HTTP gateways and a fallback store.
pub struct PinningPublisher {
    pinning: Option<Arc<dyn PinningService>>,
    gateways: Vec<Arc<dyn ContentGateway>>,
    fallback: Arc<FallbackStore>,
    gateway_base: String,
}

impl PinningPublisher {
    /// Publisher with no pinning service; every blob goes to `fallback`.
    pub fn new(fallback: Arc<FallbackStore>) -> Self {
        Self {
            pinning: None,
            gateways: Vec::new(),
            fallback,
            gateway_base: DEFAULT_GATEWAY_URL.to_string(),
        }
    }

    pub fn with_pinning(mut self, pinning: Arc<dyn PinningService>) -> Self {
        self.pinning = Some(pinning);
        self
    }

    /// Append a gateway; `fetch` consults gateways in insertion order.
    pub fn with_gateway(mut self, gateway: Arc<dyn ContentGateway>) -> Self {
        self.gateways.push(gateway);
        self
    }

    /// Base used to build `gateway_url` for remotely pinned records.
    pub fn with_gateway_base(mut self, base: impl Into<String>) -> Self {
        self.gateway_base = base.into();
        self
    }

    pub fn fallback(&self) -> &Arc<FallbackStore> {
        &self.fallback
    }

    fn publish_fallback(&self, blob: &[u8]) -> Result<ContentRecord> {
        self.fallback.put(blob)
    }
}

#[async_trait]
impl ContentPublisher for PinningPublisher {
    async fn publish(&self, blob: &[u8], metadata: PublishMetadata) -> Result<ContentRecord> {
        let Some(pinning) = &self.pinning else {
            warn!("Pinning credentials not configured, using fallback store");
            return self.publish_fallback(blob);
        };

        let pinata_metadata = metadata.to_pinata();
        match pinning.pin_file(blob.to_vec(), &pinata_metadata).await {
            Ok(pinned) if !pinned.ipfs_hash.is_empty() => {
                let created_at = pinned.created_at();
                let size = if pinned.pin_size > 0 {
                    pinned.pin_size
                } else {
                    blob.len() as u64
                };
                let record = ContentRecord::remote(
                    ContentId::new(pinned.ipfs_hash),
                    size,
                    created_at,
                    &self.gateway_base,
                );
                info!(content_id = %record.content_id, size_bytes = record.size_bytes, "Published to pinning service");
                Ok(record)
            }
            Ok(_) => {
                warn!("Pinning service returned no content identifier, using fallback store");
                self.publish_fallback(blob)
            }
            Err(e) => {
                warn!(error = %e, "Pinning service upload failed, using fallback store");
                self.publish_fallback(blob)
            }
        }
    }

    async fn fetch(&self, content_id: &ContentId) -> Result<Vec<u8>> {
        for gateway in &self.gateways {
            match gateway.fetch(content_id).await {
                Ok(bytes) => {
                    debug!(%content_id, gateway = gateway.name(), "Fetched content");
                    return Ok(bytes);
                }
                Err(e) => {
                    debug!(%content_id, gateway = gateway.name(), error = %e, "Gateway miss");
                }
            }
        }

        if content_id.is_fallback() {
            if let Some(bytes) = self.fallback.get(content_id)? {
                debug!(%content_id, "Fetched content from fallback store");
                return Ok(bytes);
            }
        }

        Err(PublishError::NotFound(content_id.clone()))
    }

    async fn pin(&self, content_id: &ContentId) -> PinOutcome {
        if content_id.is_fallback() {
            return PinOutcome::success("Fallback content is held locally");
        }
        let Some(pinning) = &self.pinning else {
            return PinOutcome::success("Mock pinning successful");
        };

        match pinning.pin_by_hash(content_id).await {
            Ok(()) => {
                info!(%content_id, "Pinned content");
                PinOutcome::success("File pinned successfully")
            }
            Err(e) => {
                warn!(%content_id, error = %e, "Pin request failed");
                PinOutcome::failure(e.to_string())
            }
        }
    }

    async fn metadata(&self, content_id: &ContentId) -> Option<PinMetadata> {
        let pinning = self.pinning.as_ref()?;
        match pinning.pin_list(content_id).await {
            Ok(row) => row,
            Err(e) => {
                warn!(%content_id, error = %e, "Metadata lookup failed");
                None
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.pinning.is_some()
    }
}
