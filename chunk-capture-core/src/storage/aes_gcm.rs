use std::collections::HashMap;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};

use crate::models::error::CaptureError;
use crate::traits::encryptor::ChunkEncryptor;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

pub const AES_256_GCM: &str = "AES-256-GCM";

/// AES-256-GCM chunk encryptor.
///
/// Sealed format: `nonce (12B) || ciphertext || tag (16B)`, with a fresh
/// random nonce per chunk.
pub struct AesGcmEncryptor {
    cipher: Aes256Gcm,
    key_id: String,
}

impl AesGcmEncryptor {
    pub fn new(key: [u8; 32], key_id: impl Into<String>) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(&key);
        Self {
            cipher: Aes256Gcm::new(key),
            key_id: key_id.into(),
        }
    }

    /// Parse a 64-character hex key, as taken from the command line.
    pub fn from_hex(hex: &str, key_id: impl Into<String>) -> Result<Self, CaptureError> {
        let hex = hex.trim();
        if hex.len() != 64 || !hex.is_ascii() {
            return Err(CaptureError::InvalidConfiguration(
                "encryption key must be 64 hex characters".into(),
            ));
        }
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| CaptureError::InvalidConfiguration("encryption key is not valid hex".into()))?;
        }
        Ok(Self::new(key, key_id))
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Open a sealed chunk produced by [`encrypt`](ChunkEncryptor::encrypt).
    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, CaptureError> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(CaptureError::EncryptionFailed("sealed chunk is truncated".into()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CaptureError::EncryptionFailed(format!("AES-GCM decryption failed: {}", e)))
    }
}

impl ChunkEncryptor for AesGcmEncryptor {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, data)
            .map_err(|e| format!("AES-GCM encryption failed: {}", e))?;

        // aes-gcm appends the tag to the ciphertext; only the nonce is prepended.
        let mut sealed = Vec::with_capacity(nonce.len() + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn key_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            ("keyId".to_string(), self.key_id.clone()),
            ("algorithm".to_string(), AES_256_GCM.to_string()),
        ])
    }

    fn algorithm(&self) -> &str {
        AES_256_GCM
    }
}
