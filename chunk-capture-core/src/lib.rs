//! # chunk-capture-core
//!
//! Platform-agnostic audio chunk capture core library.
//!
//! Splits continuous audio into fixed-duration, independently encoded WAV
//! chunks and hands each one to a [`ChunkSink`] (typically an uploader).
//! Two pipelines share the encoder:
//!
//! - [`LiveCapture`]: timer-driven segmentation of a [`LiveStream`]
//!   (implemented for real devices by `chunk-capture-cpal`).
//! - [`ReplayCapture`]: demand-driven segmentation of a decoded file.
//!
//! ## Architecture
//!
//! ```text
//! chunk-capture-core (this crate)
//! ├── traits/       ← LiveStream, ChunkSink, ChunkEncryptor
//! ├── models/       ← CaptureError, CaptureStatus, ChunkingConfig, AudioChunk, etc.
//! ├── processing/   ← WAV encoding/parsing, Symphonia decoding
//! ├── session/      ← LiveCapture, ReplayCapture, chunk timer, device lease
//! └── storage/      ← ChunkSpool, metadata sidecars, AES-256-GCM
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioSource, DecodedAudio, StreamFormat};
pub use models::chunk::{AudioChunk, ChunkMetadata};
pub use models::config::{ChunkingConfig, SourceFormat, DEFAULT_CHUNK_DURATION_SECS};
pub use models::error::{CaptureError, UploadError};
pub use models::state::{CaptureStatus, LiveCaptureSnapshot, ReplayProgress};
pub use processing::decoder::decode_audio;
pub use processing::wav_format::{encode_wav, WavHeader};
pub use session::live::LiveCapture;
pub use session::replay::{ReplayBuffer, ReplayCapture};
pub use storage::aes_gcm::AesGcmEncryptor;
pub use storage::chunk_spool::ChunkSpool;
pub use traits::chunk_sink::{ChunkSink, ErrorCallback};
pub use traits::encryptor::ChunkEncryptor;
pub use traits::live_stream::{FaultCallback, LiveStream, SampleCallback};
