//! At-rest encryption for user secrets (SMTP passwords).
//!
//! AES-256-GCM with a random 96-bit nonce per value. The stored form is
//! `base64(nonce || ciphertext)`, where the ciphertext includes the 16-byte
//! authentication tag.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Key size in bytes.
pub const KEY_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed")]
    Encryption,

    #[error("Decryption failed: {0}")]
    Decryption(String),
}

/// A 256-bit key used to seal and open stored secrets.
#[derive(Clone)]
pub struct SecretKey([u8; KEY_SIZE]);

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a key from its base64 form (as stored in configuration).
    pub fn from_base64(encoded: &str) -> Result<Self, SecretError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SecretError::InvalidKey(format!("not base64: {e}")))?;
        let arr: [u8; KEY_SIZE] = bytes.try_into().map_err(|v: Vec<u8>| {
            SecretError::InvalidKey(format!("expected {KEY_SIZE} bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }

    /// Encrypt `plaintext`, returning the base64 storage form.
    pub fn seal(&self, plaintext: &str) -> Result<String, SecretError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher()
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| SecretError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    /// Decrypt a value produced by [`SecretKey::seal`].
    pub fn open(&self, sealed: &str) -> Result<String, SecretError> {
        let bytes = STANDARD
            .decode(sealed)
            .map_err(|e| SecretError::Decryption(format!("invalid base64: {e}")))?;
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(SecretError::Decryption("data too short".into()));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SecretError::Decryption("wrong key or tampered data".into()))?;
        String::from_utf8(plaintext)
            .map_err(|e| SecretError::Decryption(format!("invalid UTF-8: {e}")))
    }
}
