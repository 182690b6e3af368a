use serde::{Deserialize, Serialize};

/// MIME type of every chunk payload produced by this crate.
pub const WAV_CONTENT_TYPE: &str = "audio/wav";

/// One finalized, independently encoded segment of audio.
///
/// Immutable once created; ownership moves to the sink on delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// 1-based, contiguous within a capture session.
    pub sequence_number: u32,
    /// Encoded container bytes.
    pub payload: Vec<u8>,
    /// Actual elapsed (live) or sliced (replay) duration.
    pub duration_secs: f64,
}

impl AudioChunk {
    pub fn new(sequence_number: u32, payload: Vec<u8>, duration_secs: f64) -> Self {
        Self {
            sequence_number,
            payload,
            duration_secs,
        }
    }

    pub fn content_type(&self) -> &'static str {
        WAV_CONTENT_TYPE
    }

    /// Upload file name, e.g. `chunk-3.wav`.
    pub fn file_name(&self) -> String {
        format!("chunk-{}.wav", self.sequence_number)
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Metadata stored alongside a spooled chunk.
///
/// Serializable for JSON export to the uploader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub id: String,
    pub sequence_number: u32,
    pub duration_secs: f64,
    pub byte_length: u64,
    pub checksum: String,
    pub content_type: String,
    pub is_encrypted: bool,
    pub created_at: String,
    pub encryption_algorithm: Option<String>,
    pub encryption_key_id: Option<String>,
}

impl ChunkMetadata {
    /// Describes `chunk` as it was written: `byte_length` and `checksum`
    /// refer to the stored bytes, which differ from the payload when encrypted.
    pub fn for_chunk(
        chunk: &AudioChunk,
        byte_length: u64,
        checksum: &str,
        encryption_algorithm: Option<String>,
        encryption_key_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sequence_number: chunk.sequence_number,
            duration_secs: chunk.duration_secs,
            byte_length,
            checksum: checksum.to_string(),
            content_type: chunk.content_type().to_string(),
            is_encrypted: encryption_algorithm.is_some(),
            created_at: chrono::Utc::now().to_rfc3339(),
            encryption_algorithm,
            encryption_key_id,
        }
    }
}
