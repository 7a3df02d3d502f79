//! Client-side cryptography for GenomeGuard
//!
//! Holds the single symmetric key of an installation in a durable local
//! store and encrypts payloads with AES-256-GCM before anything leaves the
//! device.

pub mod encryption;
pub mod errors;
pub mod key_store;

pub use encryption::{sha256_hex, EncryptedPayload, EncryptionEngine, NONCE_LEN, TAG_LEN};
pub use errors::{CryptoError, Result};
pub use key_store::{KeyStore, SymmetricKey, DEFAULT_KEY_ID, KEY_ALGORITHM};
