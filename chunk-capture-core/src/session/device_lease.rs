use parking_lot::{const_mutex, Mutex};

use crate::models::error::CaptureError;

/// Device ids currently held by a live capture session in this process.
static HELD_DEVICES: Mutex<Vec<String>> = const_mutex(Vec::new());

/// Exclusive claim on an input device, released on drop.
///
/// A second session starting on a held device gets `DeviceBusy` instead of
/// silently taking the device over.
#[derive(Debug)]
pub struct DeviceLease {
    device_id: String,
}

impl DeviceLease {
    pub fn acquire(device_id: &str) -> Result<Self, CaptureError> {
        let mut held = HELD_DEVICES.lock();
        if held.iter().any(|id| id == device_id) {
            return Err(CaptureError::DeviceBusy);
        }
        held.push(device_id.to_string());
        Ok(Self {
            device_id: device_id.to_string(),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_held(device_id: &str) -> bool {
        HELD_DEVICES.lock().iter().any(|id| id == device_id)
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        HELD_DEVICES.lock().retain(|id| id != &self.device_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_busy_until_release() {
        let first = DeviceLease::acquire("lease-test-mic").unwrap();
        assert!(DeviceLease::is_held("lease-test-mic"));
        assert_eq!(
            DeviceLease::acquire("lease-test-mic").unwrap_err(),
            CaptureError::DeviceBusy
        );

        drop(first);
        assert!(!DeviceLease::is_held("lease-test-mic"));
        let again = DeviceLease::acquire("lease-test-mic").unwrap();
        assert_eq!(again.device_id(), "lease-test-mic");
    }

    #[test]
    fn distinct_devices_do_not_conflict() {
        let _a = DeviceLease::acquire("lease-test-a").unwrap();
        let _b = DeviceLease::acquire("lease-test-b").unwrap();
    }
}
