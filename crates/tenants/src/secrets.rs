//! Explicit credential encryption at the store boundary.
//!
//! XChaCha20-Poly1305 with a random 24-byte nonce prefixed to the
//! ciphertext, the whole blob base64-encoded for storage in a TEXT column.

use {
    base64::Engine,
    chacha20poly1305::{
        XChaCha20Poly1305, XNonce,
        aead::{Aead, KeyInit},
    },
    rand::RngCore,
};

use crate::error::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
const NONCE_LEN: usize = 24;

/// Symmetric cipher for credential blobs.
#[derive(Clone)]
pub struct CredentialCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl CredentialCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Parse a 64-character hex master key.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key).map_err(Error::cipher)?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::cipher("master key must be 32 bytes (64 hex chars)"))?;
        Ok(Self::new(key))
    }

    /// Encrypt a plaintext string into a storable base64 blob.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String> {
        let cipher = XChaCha20Poly1305::new((&self.key).into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(Error::cipher)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(blob))
    }

    /// Decrypt a base64 blob produced by [`encrypt_str`](Self::encrypt_str).
    pub fn decrypt_str(&self, blob: &str) -> Result<String> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(blob)
            .map_err(Error::cipher)?;
        if bytes.len() < NONCE_LEN + 16 {
            return Err(Error::cipher("ciphertext too short"));
        }

        let (nonce_bytes, ct) = bytes.split_at(NONCE_LEN);
        let nonce = XNonce::from_slice(nonce_bytes);
        let cipher = XChaCha20Poly1305::new((&self.key).into());

        let plaintext = cipher.decrypt(nonce, ct).map_err(Error::cipher)?;
        String::from_utf8(plaintext).map_err(Error::cipher)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let cipher = CredentialCipher::new([0x42u8; 32]);
        let blob = cipher.encrypt_str("EAAG...token").unwrap();
        assert_ne!(blob, "EAAG...token");
        assert_eq!(cipher.decrypt_str(&blob).unwrap(), "EAAG...token");
    }

    #[test]
    fn nonces_differ_between_calls() {
        let cipher = CredentialCipher::new([0x42u8; 32]);
        let a = cipher.encrypt_str("same").unwrap();
        let b = cipher.encrypt_str("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let blob = CredentialCipher::new([0x01u8; 32])
            .encrypt_str("secret")
            .unwrap();
        assert!(
            CredentialCipher::new([0x02u8; 32])
                .decrypt_str(&blob)
                .is_err()
        );
    }

    #[test]
    fn from_hex_validates_length() {
        assert!(CredentialCipher::from_hex(&"ab".repeat(32)).is_ok());
        assert!(CredentialCipher::from_hex("abcd").is_err());
        assert!(CredentialCipher::from_hex("zz").is_err());
    }
}
