use thiserror::Error;

/// Failure reported by a [`ChunkSink`](crate::traits::chunk_sink::ChunkSink).
///
/// Opaque to the capture pipelines: a failed delivery only means that one
/// chunk is lost, never that the session stops.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("upload failed: {message}")]
pub struct UploadError {
    pub message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that can occur during chunk capture operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("device not available")]
    DeviceUnavailable,

    #[error("device is held by another capture session")]
    DeviceBusy,

    #[error("decode failed: {0}")]
    DecodeError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid audio data: {0}")]
    InvalidAudioData(String),

    #[error("a chunk is already being processed")]
    AlreadyProcessing,

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("session already stopped")]
    SessionStopped,

    #[error("replay source was replaced while a chunk was being processed")]
    SourceReplaced,

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Whether the error means the input device is gone for good.
    pub fn is_device_loss(&self) -> bool {
        matches!(self, Self::DeviceUnavailable | Self::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_converts_transparently() {
        let err: CaptureError = UploadError::new("503 from server").into();
        assert_eq!(err.to_string(), "upload failed: 503 from server");
        assert!(matches!(err, CaptureError::Upload(_)));
    }

    #[test]
    fn device_loss_classification() {
        assert!(CaptureError::DeviceUnavailable.is_device_loss());
        assert!(!CaptureError::DeviceBusy.is_device_loss());
        assert!(!CaptureError::Upload(UploadError::new("x")).is_device_loss());
    }
}
