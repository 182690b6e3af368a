use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::chunk::{AudioChunk, ChunkMetadata};
use crate::models::error::{CaptureError, UploadError};
use crate::storage::metadata;
use crate::traits::chunk_sink::ChunkSink;
use crate::traits::encryptor::ChunkEncryptor;

/// Local [`ChunkSink`] that writes every chunk into a directory.
///
/// ## Layout
///
/// ```text
/// {dir}/chunk-1.wav              (or chunk-1.enc.wav when encrypted)
/// {dir}/chunk-1.metadata.json
/// {dir}/chunk-2.wav
/// ...
/// ```
///
/// Encrypted chunks hold the sealed box of the whole WAV payload; the
/// checksum in the sidecar is over the bytes as written.
pub struct ChunkSpool {
    dir: PathBuf,
    encryptor: Option<Box<dyn ChunkEncryptor>>,
}

impl ChunkSpool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            encryptor: None,
        }
    }

    pub fn with_encryptor(mut self, encryptor: Box<dyn ChunkEncryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryptor.is_some()
    }

    pub fn chunk_path(&self, sequence_number: u32) -> PathBuf {
        let name = if self.is_encrypted() {
            format!("chunk-{}.enc.wav", sequence_number)
        } else {
            format!("chunk-{}.wav", sequence_number)
        };
        self.dir.join(name)
    }

    /// Write `chunk` and its sidecar, returning the sidecar contents.
    pub fn write_chunk(&self, chunk: &AudioChunk) -> Result<ChunkMetadata, CaptureError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;

        let (bytes, algorithm, key_id) = match &self.encryptor {
            Some(encryptor) => {
                let sealed = encryptor
                    .encrypt(&chunk.payload)
                    .map_err(|e| CaptureError::EncryptionFailed(format!("chunk encryption failed: {}", e)))?;
                let key_id = encryptor.key_metadata().get("keyId").cloned();
                (sealed, Some(encryptor.algorithm().to_string()), key_id)
            }
            None => (chunk.payload.clone(), None, None),
        };

        let path = self.chunk_path(chunk.sequence_number);
        fs::write(&path, &bytes).map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;

        let checksum = sha256_hex(&bytes);
        let meta = ChunkMetadata::for_chunk(chunk, bytes.len() as u64, &checksum, algorithm, key_id);
        metadata::write_metadata(&meta, &self.dir)?;

        log::debug!("Spooled chunk {} to {}", chunk.sequence_number, path.display());
        Ok(meta)
    }
}

impl ChunkSink for ChunkSpool {
    fn emit(&self, chunk: AudioChunk) -> Result<(), UploadError> {
        self.write_chunk(&chunk)
            .map(|_| ())
            .map_err(|e| UploadError::new(e.to_string()))
    }
}

/// Lowercase hex of a SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex_encode(&Sha256::digest(data))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::wav_format::{encode_wav, WavHeader};
    use crate::storage::aes_gcm::AesGcmEncryptor;
    use std::collections::HashMap;

    struct NullEncryptor;

    impl ChunkEncryptor for NullEncryptor {
        fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, String> {
            // fake nonce + data + fake tag
            let mut result = vec![0xAA; 12];
            result.extend_from_slice(data);
            result.extend_from_slice(&[0xBB; 16]);
            Ok(result)
        }

        fn key_metadata(&self) -> HashMap<String, String> {
            HashMap::from([("keyId".to_string(), "test-key".to_string())])
        }

        fn algorithm(&self) -> &str {
            "TEST-ENCRYPTOR"
        }
    }

    struct FailingEncryptor;

    impl ChunkEncryptor for FailingEncryptor {
        fn encrypt(&self, _data: &[u8]) -> Result<Vec<u8>, String> {
            Err("key unavailable".into())
        }

        fn key_metadata(&self) -> HashMap<String, String> {
            HashMap::new()
        }

        fn algorithm(&self) -> &str {
            "FAILING"
        }
    }

    fn temp_spool_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("chunk_capture_spool_{}_{}", name, uuid::Uuid::new_v4()))
    }

    fn wav_chunk(sequence_number: u32) -> AudioChunk {
        let payload = encode_wav(&[vec![0.25f32; 400]], 8000).unwrap();
        AudioChunk::new(sequence_number, payload, 0.05)
    }

    #[test]
    fn writes_plain_chunk_and_sidecar() {
        let dir = temp_spool_dir("plain");
        let spool = ChunkSpool::new(&dir);
        let chunk = wav_chunk(1);

        spool.emit(chunk.clone()).unwrap();

        let data = fs::read(dir.join("chunk-1.wav")).unwrap();
        assert_eq!(data, chunk.payload);
        assert_eq!(WavHeader::parse(&data).unwrap().frame_count(), 400);

        let meta = metadata::read_metadata(&dir, 1).unwrap();
        assert_eq!(meta.sequence_number, 1);
        assert_eq!(meta.byte_length, data.len() as u64);
        assert_eq!(meta.checksum, sha256_hex(&data));
        assert_eq!(meta.checksum.len(), 64);
        assert_eq!(meta.content_type, "audio/wav");
        assert!(!meta.is_encrypted);
        assert!(meta.encryption_key_id.is_none());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn writes_sealed_chunk() {
        let dir = temp_spool_dir("sealed");
        let spool = ChunkSpool::new(&dir).with_encryptor(Box::new(NullEncryptor));
        let chunk = wav_chunk(3);

        let meta = spool.write_chunk(&chunk).unwrap();

        let data = fs::read(dir.join("chunk-3.enc.wav")).unwrap();
        assert_eq!(data.len(), 12 + chunk.payload.len() + 16);
        assert_eq!(&data[12..12 + chunk.payload.len()], chunk.payload.as_slice());
        assert!(meta.is_encrypted);
        assert_eq!(meta.encryption_algorithm.as_deref(), Some("TEST-ENCRYPTOR"));
        assert_eq!(meta.encryption_key_id.as_deref(), Some("test-key"));
        assert_eq!(meta.checksum, sha256_hex(&data));
        assert!(dir.join("chunk-3.metadata.json").exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn aes_sealed_chunk_opens_to_original_wav() {
        let dir = temp_spool_dir("aes");
        let key = [0x42u8; 32];
        let spool = ChunkSpool::new(&dir).with_encryptor(Box::new(AesGcmEncryptor::new(key, "k1")));
        let chunk = wav_chunk(2);
        spool.emit(chunk.clone()).unwrap();

        let sealed = fs::read(spool.chunk_path(2)).unwrap();
        let opened = AesGcmEncryptor::new(key, "k1").decrypt(&sealed).unwrap();
        assert_eq!(opened, chunk.payload);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn encryption_failure_surfaces_as_upload_error() {
        let dir = temp_spool_dir("failing");
        let spool = ChunkSpool::new(&dir).with_encryptor(Box::new(FailingEncryptor));

        let err = spool.emit(wav_chunk(1)).unwrap_err();
        assert!(err.message.contains("key unavailable"));
        assert!(!spool.chunk_path(1).exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn sha256_of_known_input() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
