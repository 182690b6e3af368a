use std::sync::Arc;

use crate::models::audio_models::{AudioSource, StreamFormat};
use crate::models::error::CaptureError;

/// Callback invoked when a buffer of captured audio is available.
///
/// Receives interleaved f32 samples in the [`StreamFormat`] returned by
/// [`LiveStream::start`]. Buffers arrive in capture order.
pub type SampleCallback = Arc<dyn Fn(&[f32]) + Send + Sync + 'static>;

/// Callback invoked when the stream fails after it was started
/// (e.g. the device was unplugged).
pub type FaultCallback = Arc<dyn Fn(CaptureError) + Send + Sync + 'static>;

/// Permission-gated access to a continuous audio input.
///
/// Implemented by:
/// - `CpalInputStream` (chunk-capture-cpal)
/// - test fakes that push samples by hand
pub trait LiveStream: Send + Sync {
    /// Whether an input device is present at all.
    fn is_available(&self) -> bool;

    /// Open the device and start delivering buffers via `on_samples`.
    ///
    /// Fails with `PermissionDenied` or `DeviceUnavailable` when access is
    /// refused. The callbacks may fire on a dedicated audio thread; keep
    /// processing minimal.
    fn start(
        &mut self,
        on_samples: SampleCallback,
        on_fault: FaultCallback,
    ) -> Result<StreamFormat, CaptureError>;

    /// Suspend delivery without releasing the device.
    fn pause(&mut self) -> Result<(), CaptureError>;

    /// Resume delivery after `pause`.
    fn resume(&mut self) -> Result<(), CaptureError>;

    /// Stop capturing and release the device. No buffers are delivered
    /// once this returns.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Information about the device backing this stream.
    fn device_info(&self) -> AudioSource;
}
