use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix carried by identifiers minted by the local fallback store.
pub const FALLBACK_CID_PREFIX: &str = "Qmmock";

/// Identifier of a blob in the content-addressed store.
///
/// Real identifiers come back from the pinning service; identifiers starting
/// with [`FALLBACK_CID_PREFIX`] were minted locally and only resolve against
/// the fallback store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Whether this identifier was minted by the local fallback store.
    pub fn is_fallback(&self) -> bool {
        self.0.starts_with(FALLBACK_CID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ContentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ContentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Published ciphertext, as seen by every downstream stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Durable reference handed to the ledger and the backend.
    pub content_id: ContentId,

    /// Size of the published blob in bytes.
    pub size_bytes: u64,

    /// When the blob was accepted by the store.
    pub created_at: DateTime<Utc>,

    /// True when the blob only lives in the local fallback store.
    pub mock: bool,

    /// Where the blob can be retrieved from.
    pub gateway_url: String,
}

impl ContentRecord {
    /// Record for a blob accepted by the remote pinning service.
    pub fn remote(
        content_id: ContentId,
        size_bytes: u64,
        created_at: DateTime<Utc>,
        gateway_base: &str,
    ) -> Self {
        let gateway_url = format!("{}/ipfs/{}", gateway_base.trim_end_matches('/'), content_id);
        Self {
            content_id,
            size_bytes,
            created_at,
            mock: false,
            gateway_url,
        }
    }

    /// Record for a blob held by the local fallback store.
    pub fn fallback(content_id: ContentId, size_bytes: u64) -> Self {
        let gateway_url = format!("mock://ipfs/{}", content_id);
        Self {
            content_id,
            size_bytes,
            created_at: Utc::now(),
            mock: true,
            gateway_url,
        }
    }
}
