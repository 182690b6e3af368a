//! Input device enumeration via the cpal default host.

use cpal::traits::{DeviceTrait, HostTrait};

use chunk_capture_core::{AudioSource, CaptureError};

/// List input devices of the default host. cpal exposes no stable device
/// id, so the device name doubles as the id.
pub fn list_input_devices() -> Result<Vec<AudioSource>, CaptureError> {
    let host = cpal::default_host();
    let default_name = default_input_device_name();

    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Unknown(format!("failed to enumerate input devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .map(|name| AudioSource {
            is_default: default_name.as_deref() == Some(name.as_str()),
            id: name.clone(),
            name,
        })
        .collect();

    Ok(devices)
}

pub fn default_input_device_name() -> Option<String> {
    cpal::default_host()
        .default_input_device()
        .and_then(|device| device.name().ok())
}

/// Find an input device by name, or the default one.
pub(crate) fn resolve_input_device(name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .input_devices()
            .map_err(|e| CaptureError::Unknown(format!("failed to enumerate input devices: {}", e)))?
            .find(|d| d.name().ok().as_deref() == Some(name))
            .ok_or(CaptureError::DeviceUnavailable),
        None => host.default_input_device().ok_or(CaptureError::DeviceUnavailable),
    }
}
