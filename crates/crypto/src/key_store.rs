//! Durable storage for the installation's symmetric key
//!
//! Exactly one key lives in the `keys` tree under [`DEFAULT_KEY_ID`]. It is
//! created lazily on first use and kept until explicitly deleted.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::errors::*;

/// Identifier of the single active key.
pub const DEFAULT_KEY_ID: &str = "default";

/// JWK algorithm name of the stored key.
pub const KEY_ALGORITHM: &str = "A256GCM";

const KEYS_TREE: &str = "keys";

/// 256-bit AES key plus its identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey {
    key_id: String,
    material: [u8; 32],
    created_at: DateTime<Utc>,
}

impl SymmetricKey {
    /// Generate fresh key material from the OS random source.
    pub fn generate(key_id: impl Into<String>) -> Self {
        let mut material = [0u8; 32];
        OsRng.fill_bytes(&mut material);
        Self {
            key_id: key_id.into(),
            material,
            created_at: Utc::now(),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn material(&self) -> &[u8; 32] {
        &self.material
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn to_record(&self) -> KeyRecord {
        KeyRecord {
            kty: "oct".to_string(),
            kid: self.key_id.clone(),
            alg: KEY_ALGORITHM.to_string(),
            k: general_purpose::URL_SAFE_NO_PAD.encode(self.material),
            created_at: self.created_at,
        }
    }

    fn from_record(record: &KeyRecord) -> std::result::Result<Self, String> {
        if record.kty != "oct" {
            return Err(format!("unsupported key type `{}`", record.kty));
        }
        if record.alg != KEY_ALGORITHM {
            return Err(format!("unsupported algorithm `{}`", record.alg));
        }
        let mut bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(record.k.as_bytes())
            .map_err(|e| format!("invalid key material encoding: {e}"))?;
        if bytes.len() != 32 {
            let len = bytes.len();
            bytes.zeroize();
            return Err(format!("key material must be 32 bytes, got {len}"));
        }
        let mut material = [0u8; 32];
        material.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self {
            key_id: record.kid.clone(),
            material,
            created_at: record.created_at,
        })
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.material.zeroize();
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("key_id", &self.key_id)
            .field("material", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Persisted form of a key (JWK `oct` layout).
#[derive(Serialize, Deserialize)]
struct KeyRecord {
    kty: String,
    kid: String,
    alg: String,
    k: String,
    created_at: DateTime<Utc>,
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        self.k.zeroize();
    }
}

/// Sled-backed key store
pub struct KeyStore {
    db: Db,
    keys: Tree,
}

impl KeyStore {
    /// Open (or create) the key database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::with_db(db)
    }

    /// Use an already opened database; the key lives in its own tree.
    pub fn with_db(db: Db) -> Result<Self> {
        let keys = db.open_tree(KEYS_TREE)?;
        Ok(Self { db, keys })
    }

    /// Throwaway store that is removed when dropped.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db)
    }

    /// Load the active key, if one has been created.
    pub fn get_key(&self) -> Result<Option<SymmetricKey>> {
        match self.keys.get(DEFAULT_KEY_ID)? {
            Some(raw) => Ok(Some(Self::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Return the active key, generating and persisting it on first use.
    pub fn get_or_create_key(&self) -> Result<SymmetricKey> {
        if let Some(key) = self.get_key()? {
            return Ok(key);
        }

        let key = SymmetricKey::generate(DEFAULT_KEY_ID);
        let encoded = Self::encode(&key)?;

        // Concurrent first uses race on an empty slot; only one write lands.
        match self
            .keys
            .compare_and_swap(DEFAULT_KEY_ID, None::<&[u8]>, Some(encoded))?
        {
            Ok(()) => {
                self.db.flush()?;
                info!(key_id = DEFAULT_KEY_ID, "Generated new encryption key");
                Ok(key)
            }
            Err(_) => {
                debug!("Key created concurrently, using stored key");
                self.get_key()?.ok_or_else(|| {
                    CryptoError::Storage("key vanished after concurrent creation".to_string())
                })
            }
        }
    }

    /// Remove the active key. Succeeds when no key exists.
    pub fn delete_key(&self) -> Result<()> {
        if self.keys.remove(DEFAULT_KEY_ID)?.is_some() {
            self.db.flush()?;
            warn!(key_id = DEFAULT_KEY_ID, "Encryption key deleted");
        }
        Ok(())
    }

    /// Serialize the active key as a base64 backup string.
    pub fn export_key(&self) -> Result<String> {
        let key = self.get_key()?.ok_or(CryptoError::KeyMissing)?;
        let mut json = serde_json::to_vec(&key.to_record())
            .map_err(|e| CryptoError::Storage(format!("Failed to serialize key: {e}")))?;
        let exported = general_purpose::STANDARD.encode(&json);
        json.zeroize();
        Ok(exported)
    }

    /// Restore a key produced by [`KeyStore::export_key`], replacing the active key.
    pub fn import_key(&self, backup: &str) -> Result<()> {
        let mut json = general_purpose::STANDARD
            .decode(backup.trim())
            .map_err(|e| CryptoError::InvalidKeyBackup(format!("not base64: {e}")))?;
        let parsed = serde_json::from_slice::<KeyRecord>(&json);
        json.zeroize();
        let record =
            parsed.map_err(|e| CryptoError::InvalidKeyBackup(format!("not a key record: {e}")))?;

        let mut key = SymmetricKey::from_record(&record).map_err(CryptoError::InvalidKeyBackup)?;
        // Whatever id the backup carried, it becomes the active key.
        key.key_id = DEFAULT_KEY_ID.to_string();

        self.keys.insert(DEFAULT_KEY_ID, Self::encode(&key)?)?;
        self.db.flush()?;
        info!(key_id = DEFAULT_KEY_ID, "Encryption key imported");
        Ok(())
    }

    fn encode(key: &SymmetricKey) -> Result<Vec<u8>> {
        serde_json::to_vec(&key.to_record())
            .map_err(|e| CryptoError::Storage(format!("Failed to serialize key: {e}")))
    }

    fn decode(raw: &[u8]) -> Result<SymmetricKey> {
        let record: KeyRecord = serde_json::from_slice(raw)
            .map_err(|e| CryptoError::Storage(format!("Stored key is corrupted: {e}")))?;
        SymmetricKey::from_record(&record)
            .map_err(|e| CryptoError::Storage(format!("Stored key is corrupted: {e}")))
    }

    #[cfg(test)]
    pub(crate) fn write_raw(&self, raw: &[u8]) -> Result<()> {
        self.keys.insert(DEFAULT_KEY_ID, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_lazy_creation_is_stable() {
        let store = KeyStore::temporary().unwrap();
        assert!(store.get_key().unwrap().is_none());

        let first = store.get_or_create_key().unwrap();
        let second = store.get_or_create_key().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.key_id(), DEFAULT_KEY_ID);
    }

    #[test]
    fn test_key_persists_across_reopen() {
        let temp_dir = tempdir().unwrap();
        let created = {
            let store = KeyStore::open(temp_dir.path()).unwrap();
            store.get_or_create_key().unwrap()
        };

        let reopened = KeyStore::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.get_key().unwrap(), Some(created));
    }

    #[test]
    fn test_delete_then_recreate_gives_new_key() {
        let store = KeyStore::temporary().unwrap();
        let first = store.get_or_create_key().unwrap();
        store.delete_key().unwrap();
        assert!(store.get_key().unwrap().is_none());

        let second = store.get_or_create_key().unwrap();
        assert_ne!(first.material(), second.material());
    }

    #[test]
    fn test_delete_without_key_is_ok() {
        let store = KeyStore::temporary().unwrap();
        store.delete_key().unwrap();
    }

    #[test]
    fn test_export_import_roundtrip() {
        let source = KeyStore::temporary().unwrap();
        let key = source.get_or_create_key().unwrap();
        let backup = source.export_key().unwrap();

        let target = KeyStore::temporary().unwrap();
        target.import_key(&backup).unwrap();
        assert_eq!(target.get_key().unwrap().unwrap().material(), key.material());
    }

    #[test]
    fn test_export_without_key() {
        let store = KeyStore::temporary().unwrap();
        assert!(matches!(store.export_key(), Err(CryptoError::KeyMissing)));
    }

    #[test]
    fn test_import_rejects_garbage() {
        let store = KeyStore::temporary().unwrap();
        assert!(matches!(
            store.import_key("not base64 !!"),
            Err(CryptoError::InvalidKeyBackup(_))
        ));

        let not_a_key = general_purpose::STANDARD.encode(br#"{"hello":"world"}"#);
        assert!(matches!(
            store.import_key(&not_a_key),
            Err(CryptoError::InvalidKeyBackup(_))
        ));
        assert!(store.get_key().unwrap().is_none());
    }

    #[test]
    fn test_corrupted_record_is_storage_failure() {
        let store = KeyStore::temporary().unwrap();
        store.write_raw(b"{broken").unwrap();

        assert!(matches!(store.get_key(), Err(CryptoError::Storage(_))));
        // Must not paper over corruption by minting a new key.
        assert!(matches!(
            store.get_or_create_key(),
            Err(CryptoError::Storage(_))
        ));
    }

    #[test]
    fn test_concurrent_first_use_converges() {
        let store = Arc::new(KeyStore::temporary().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.get_or_create_key().unwrap())
            })
            .collect();

        let keys: Vec<SymmetricKey> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let stored = store.get_key().unwrap().unwrap();
        for key in keys {
            assert_eq!(key, stored);
        }
    }

    #[test]
    fn test_debug_redacts_material() {
        let key = SymmetricKey::generate(DEFAULT_KEY_ID);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("<redacted>"));
    }
}
