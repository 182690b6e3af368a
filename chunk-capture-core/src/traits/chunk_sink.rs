use std::sync::Arc;

use crate::models::chunk::AudioChunk;
use crate::models::error::{CaptureError, UploadError};

/// Callback invoked with errors that happen outside a caller's own call
/// (sink failures, stream faults).
pub type ErrorCallback = Arc<dyn Fn(&CaptureError) + Send + Sync + 'static>;

/// Receiver of finished chunks, typically an uploader.
///
/// Called from the chunk timer thread or from the thread that invoked
/// `stop`/`send_next`. A returned error loses that chunk only; capture
/// continues and the chunk is never re-queued.
pub trait ChunkSink: Send + Sync {
    fn emit(&self, chunk: AudioChunk) -> Result<(), UploadError>;
}

impl<F> ChunkSink for F
where
    F: Fn(AudioChunk) -> Result<(), UploadError> + Send + Sync,
{
    fn emit(&self, chunk: AudioChunk) -> Result<(), UploadError> {
        self(chunk)
    }
}
