//! Mapping of backend failure text onto [`CaptureError`].

use chunk_capture_core::CaptureError;

/// Classify a backend-specific failure description.
///
/// Platform audio layers report a refused microphone as free text
/// (ALSA `EACCES`, CoreAudio "not authorized", WASAPI `E_ACCESSDENIED`).
pub fn classify_backend_error(description: &str) -> CaptureError {
    let lower = description.to_lowercase();
    if ["permission", "denied", "not authorized", "eacces"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        CaptureError::PermissionDenied
    } else if ["no such device", "not available", "disconnected", "enodev"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        CaptureError::DeviceUnavailable
    } else {
        CaptureError::Unknown(description.to_string())
    }
}
