//! AES-256-GCM encryption at rest for the credentials blob.
//!
//! The content key is derived from a long-lived master secret via HKDF so
//! the master secret itself is never used directly as an AES key, and so a
//! future key rotation can re-derive per-purpose keys without touching the
//! master secret's storage.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{StoreError, StoreResult};

const NONCE_LEN: usize = 12;
const HKDF_INFO: &[u8] = b"auction-tracker/credentials/v1";

/// A derived AES-256-GCM key, zeroized on drop.
struct ContentKey([u8; 32]);

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

fn derive_content_key(master_secret: &[u8]) -> StoreResult<ContentKey> {
    let hk = Hkdf::<Sha256>::new(None, master_secret);
    let mut okm = [0u8; 32];
    hk.expand(HKDF_INFO, &mut okm)
        .map_err(|e| StoreError::Crypto(format!("hkdf expand failed: {e}")))?;
    Ok(ContentKey(okm))
}

/// Encrypt `plaintext` with a key derived from `master_secret`. Returns
/// `nonce || ciphertext`, both concatenated and base64-free (caller decides
/// the at-rest encoding — the store base64-encodes this before writing it
/// into a Redis string value).
pub fn encrypt(master_secret: &[u8], plaintext: &[u8]) -> StoreResult<Vec<u8>> {
    let content_key = derive_content_key(master_secret)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&content_key.0));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| StoreError::Crypto(format!("encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(master_secret: &[u8], blob: &[u8]) -> StoreResult<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(StoreError::Crypto("ciphertext too short".into()));
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let content_key = derive_content_key(master_secret)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&content_key.0));
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| StoreError::Crypto(format!("decryption failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let master_secret = b"a very secret master key material";
        let plaintext = b"{\"session\":\"abc\"}";
        let ciphertext = encrypt(master_secret, plaintext).unwrap();
        assert_ne!(ciphertext, plaintext);
        let decrypted = decrypt(master_secret, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let ciphertext = encrypt(b"key one material bytes long", b"secret").unwrap();
        let result = decrypt(b"key two different material..", &ciphertext);
        assert!(result.is_err());
    }

    #[test]
    fn distinct_nonces_across_calls() {
        let master_secret = b"a very secret master key material";
        let a = encrypt(master_secret, b"same plaintext").unwrap();
        let b = encrypt(master_secret, b"same plaintext").unwrap();
        assert_ne!(a, b, "nonce must be freshly random each call");
    }
}
