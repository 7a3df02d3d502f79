//! AES-256-GCM encryption of upload payloads
//!
//! Wire layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`, base64
//! encoded with the standard padded alphabet. Associated data is empty.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose, Engine as _};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use crate::errors::*;
use crate::key_store::{KeyStore, SymmetricKey};

/// Length of the random nonce prefix.
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Output of [`EncryptionEngine::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub ciphertext_base64: String,
    pub key_id: String,
}

/// Encrypts and decrypts with the key held by a [`KeyStore`].
#[derive(Clone)]
pub struct EncryptionEngine {
    keys: Arc<KeyStore>,
}

impl EncryptionEngine {
    pub fn new(keys: Arc<KeyStore>) -> Self {
        Self { keys }
    }

    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    /// Encrypt UTF-8 text, creating the key on first use.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedPayload> {
        self.encrypt_bytes(plaintext.as_bytes())
    }

    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<EncryptedPayload> {
        let key = self.keys.get_or_create_key()?;
        let sealed = seal(&key, plaintext)?;
        debug!(
            key_id = key.key_id(),
            plaintext_len = plaintext.len(),
            sealed_len = sealed.len(),
            "Encrypted payload"
        );
        Ok(EncryptedPayload {
            ciphertext_base64: general_purpose::STANDARD.encode(&sealed),
            key_id: key.key_id().to_string(),
        })
    }

    /// Decrypt a payload produced by [`EncryptionEngine::encrypt`].
    pub fn decrypt(&self, ciphertext_base64: &str) -> Result<String> {
        let plaintext = self.decrypt_bytes(ciphertext_base64)?;
        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::Integrity("decrypted payload is not UTF-8 text".to_string()))
    }

    pub fn decrypt_bytes(&self, ciphertext_base64: &str) -> Result<Vec<u8>> {
        let key = self.keys.get_key()?.ok_or(CryptoError::KeyMissing)?;
        let sealed = general_purpose::STANDARD
            .decode(ciphertext_base64.trim())
            .map_err(|e| CryptoError::Integrity(format!("invalid base64 payload: {e}")))?;
        open(&key, &sealed)
    }

    /// SHA-256 fingerprint of `content`, lowercase hex.
    pub fn hash(&self, content: &str) -> String {
        sha256_hex(content.as_bytes())
    }
}

/// SHA-256 of `data` as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Encrypt under a fresh random nonce and prepend the nonce.
pub fn seal(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.material()));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(format!("AES-GCM encryption failed: {e}")))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Split off the nonce and authenticate-then-decrypt the remainder.
pub fn open(key: &SymmetricKey, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Integrity(format!(
            "payload too short: {} bytes",
            sealed.len()
        )));
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.material()));

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::Integrity("authentication tag mismatch".to_string()))
}
