use std::collections::HashMap;

/// Encryption-at-rest interface for spooled chunks.
///
/// Default implementation uses AES-256-GCM via the `aes-gcm` crate
/// (see [`AesGcmEncryptor`](crate::storage::aes_gcm::AesGcmEncryptor)).
///
/// Sealed chunk format:
/// ```text
/// [12-byte nonce] [ciphertext] [16-byte GCM authentication tag]
/// ```
pub trait ChunkEncryptor: Send + Sync {
    /// Encrypt one chunk payload.
    ///
    /// Returns: `nonce (12 bytes) || ciphertext || tag (16 bytes)`
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, String>;

    /// Metadata about the encryption key (e.g., key ID).
    fn key_metadata(&self) -> HashMap<String, String>;

    /// Algorithm identifier (e.g., "AES-256-GCM").
    fn algorithm(&self) -> &str;
}
