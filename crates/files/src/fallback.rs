//! Local stand-in for the content-addressed network.
//!
//! Blobs land in the sled `content` tree while the byte quota allows;
//! anything beyond it (or anything sled refuses) is mirrored in memory for
//! the life of the process.

use genomeguard_types::{ContentId, ContentRecord, FALLBACK_CID_PREFIX};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use sled::{Db, Tree};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::*;

const CONTENT_TREE: &str = "content";

/// Default durable quota: 5 MiB.
pub const DEFAULT_FALLBACK_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Identifier minted for `blob` by the fallback store.
///
/// Identical bytes always map to the same identifier.
pub fn fallback_content_id(blob: &[u8]) -> ContentId {
    let digest = Sha256::digest(blob);
    ContentId::new(format!(
        "{FALLBACK_CID_PREFIX}{}",
        bs58::encode(digest).into_string()
    ))
}

/// Where a fallback blob ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTier {
    Durable,
    Memory,
}

pub struct FallbackStore {
    db: Db,
    tree: Tree,
    quota_bytes: u64,
    used_bytes: Mutex<u64>,
    memory: RwLock<HashMap<ContentId, Vec<u8>>>,
}

impl FallbackStore {
    pub fn open<P: AsRef<Path>>(path: P, quota_bytes: u64) -> Result<Self> {
        Self::with_db(sled::open(path)?, quota_bytes)
    }

    /// Share a database with other stores; blobs live in their own tree.
    pub fn with_db(db: Db, quota_bytes: u64) -> Result<Self> {
        let tree = db.open_tree(CONTENT_TREE)?;

        let mut used = 0u64;
        for entry in tree.iter() {
            let (_, value) = entry?;
            used += value.len() as u64;
        }
        debug!(used_bytes = used, quota_bytes, "Opened fallback content store");

        Ok(Self {
            db,
            tree,
            quota_bytes,
            used_bytes: Mutex::new(used),
            memory: RwLock::new(HashMap::new()),
        })
    }

    pub fn temporary(quota_bytes: u64) -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db, quota_bytes)
    }

    /// Store `blob` and describe it as a mock content record.
    pub fn put(&self, blob: &[u8]) -> Result<ContentRecord> {
        let content_id = fallback_content_id(blob);
        let size = blob.len() as u64;

        if self.contains(&content_id)? {
            debug!(%content_id, "Blob already held by fallback store");
            return Ok(ContentRecord::fallback(content_id, size));
        }

        let tier = self.write(&content_id, blob)?;
        info!(%content_id, size_bytes = size, ?tier, "Stored blob in fallback store");
        Ok(ContentRecord::fallback(content_id, size))
    }

    fn write(&self, content_id: &ContentId, blob: &[u8]) -> Result<FallbackTier> {
        self.write_with(content_id, blob, || self.db.flush())
    }

    fn write_with<F>(&self, content_id: &ContentId, blob: &[u8], flush: F) -> Result<FallbackTier>
    where
        F: FnOnce() -> sled::Result<usize>,
    {
        let size = blob.len() as u64;
        let mut used = self.used_bytes.lock();

        // Concurrent puts of the same blob serialize on the counter lock.
        if let Some(tier) = self.tier_of(content_id)? {
            return Ok(tier);
        }

        if used.saturating_add(size) <= self.quota_bytes {
            match self.persist(content_id, blob, flush) {
                Ok(()) => {
                    *used += size;
                    return Ok(FallbackTier::Durable);
                }
                Err(e) => warn!(%content_id, error = %e, "Durable fallback write failed, mirroring in memory"),
            }
        } else {
            warn!(
                %content_id,
                size_bytes = size,
                used_bytes = *used,
                quota_bytes = self.quota_bytes,
                "Fallback quota exceeded, mirroring in memory"
            );
        }

        self.memory.write().insert(content_id.clone(), blob.to_vec());
        Ok(FallbackTier::Memory)
    }

    /// Insert and flush. A blob whose flush fails is taken back out of the
    /// tree so the tree never holds bytes the quota does not count.
    fn persist<F>(&self, content_id: &ContentId, blob: &[u8], flush: F) -> sled::Result<()>
    where
        F: FnOnce() -> sled::Result<usize>,
    {
        self.tree.insert(content_id.as_str(), blob)?;
        if let Err(e) = flush() {
            self.tree.remove(content_id.as_str())?;
            return Err(e);
        }
        Ok(())
    }

    /// Look a blob up in the durable tree, then the in-memory mirror.
    pub fn get(&self, content_id: &ContentId) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.tree.get(content_id.as_str())? {
            return Ok(Some(value.to_vec()));
        }
        Ok(self.memory.read().get(content_id).cloned())
    }

    pub fn contains(&self, content_id: &ContentId) -> Result<bool> {
        Ok(self.tree.contains_key(content_id.as_str())?
            || self.memory.read().contains_key(content_id))
    }

    /// Tier currently holding `content_id`, if any.
    pub fn tier_of(&self, content_id: &ContentId) -> Result<Option<FallbackTier>> {
        if self.tree.contains_key(content_id.as_str())? {
            Ok(Some(FallbackTier::Durable))
        } else if self.memory.read().contains_key(content_id) {
            Ok(Some(FallbackTier::Memory))
        } else {
            Ok(None)
        }
    }

    pub fn used_bytes(&self) -> u64 {
        *self.used_bytes.lock()
    }

    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }
}
