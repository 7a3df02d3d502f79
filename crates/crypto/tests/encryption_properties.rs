use base64::{engine::general_purpose, Engine as _};
use genomeguard_crypto::{CryptoError, EncryptionEngine, KeyStore, NONCE_LEN, TAG_LEN};
use proptest::prelude::*;
use std::sync::Arc;

// Property-based tests for the payload cipher
// Each case gets a fresh temporary key store

fn fresh_engine() -> EncryptionEngine {
    EncryptionEngine::new(Arc::new(KeyStore::temporary().unwrap()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn decrypt_inverts_encrypt(text in ".{0,512}") {
        let engine = fresh_engine();
        let payload = engine.encrypt(&text).unwrap();
        prop_assert_eq!(engine.decrypt(&payload.ciphertext_base64).unwrap(), text);
    }

    #[test]
    fn ciphertext_length_is_plaintext_plus_overhead(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let engine = fresh_engine();
        let payload = engine.encrypt_bytes(&data).unwrap();
        let raw = general_purpose::STANDARD.decode(&payload.ciphertext_base64).unwrap();
        prop_assert_eq!(raw.len(), data.len() + NONCE_LEN + TAG_LEN);
    }

    #[test]
    fn any_bit_flip_fails_integrity(
        data in prop::collection::vec(any::<u8>(), 1..256),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let engine = fresh_engine();
        let payload = engine.encrypt_bytes(&data).unwrap();
        let mut raw = general_purpose::STANDARD.decode(&payload.ciphertext_base64).unwrap();

        let idx = position.index(raw.len());
        raw[idx] ^= 1 << bit;
        let tampered = general_purpose::STANDARD.encode(&raw);

        let result = engine.decrypt_bytes(&tampered);
        prop_assert!(matches!(result, Err(CryptoError::Integrity(_))));
    }

    #[test]
    fn truncated_payloads_fail_integrity(cut in 0usize..(NONCE_LEN + TAG_LEN)) {
        let engine = fresh_engine();
        let payload = engine.encrypt("##fileformat=VCFv4.2").unwrap();
        let raw = general_purpose::STANDARD.decode(&payload.ciphertext_base64).unwrap();
        let truncated = general_purpose::STANDARD.encode(&raw[..cut]);

        prop_assert!(matches!(engine.decrypt(&truncated), Err(CryptoError::Integrity(_))));
    }

    #[test]
    fn hash_is_lowercase_hex_of_fixed_width(text in ".{0,256}") {
        let engine = fresh_engine();
        let digest = engine.hash(&text);
        prop_assert_eq!(digest.len(), 64);
        prop_assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        prop_assert_eq!(digest, engine.hash(&text));
    }
}

#[test]
fn imported_key_decrypts_previous_payloads() {
    let original = fresh_engine();
    let payload = original.encrypt("CHROM\tPOS\tID").unwrap();
    let backup = original.key_store().export_key().unwrap();

    let restored = fresh_engine();
    restored.key_store().import_key(&backup).unwrap();
    assert_eq!(
        restored.decrypt(&payload.ciphertext_base64).unwrap(),
        "CHROM\tPOS\tID"
    );
}
