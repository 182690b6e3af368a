use serde::{Deserialize, Serialize};

/// Live capture session state machine.
///
/// State transitions:
/// ```text
/// idle → recording ↔ paused
///            ↓         ↓
///            └→ stopped ←┘
/// ```
///
/// `stopped` is terminal; a new session must be constructed to record again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl CaptureStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Recording or paused: the device is held and chunks are still cut.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Point-in-time view of a live capture session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveCaptureSnapshot {
    pub status: CaptureStatus,
    /// Sequence number of the last chunk handed to the sink (0 before the first).
    pub chunks_emitted: u32,
    /// Sum of the durations of all emitted chunks.
    pub total_duration_secs: f64,
    /// Frames accumulated since the last chunk boundary.
    pub pending_frames: usize,
    pub error: Option<String>,
}

/// Point-in-time view of a replay capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayProgress {
    pub chunks_sent: usize,
    pub total_chunks: usize,
    pub is_processing: bool,
    pub is_complete: bool,
    pub error: Option<String>,
}

impl ReplayProgress {
    /// Completion in percent, 0 when nothing is loaded.
    pub fn percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        self.chunks_sent as f64 / self.total_chunks as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_predicates() {
        assert!(CaptureStatus::default().is_idle());
        assert!(CaptureStatus::Recording.is_active());
        assert!(CaptureStatus::Paused.is_active());
        assert!(!CaptureStatus::Stopped.is_active());
        assert!(CaptureStatus::Stopped.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&CaptureStatus::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
    }

    #[test]
    fn progress_percent() {
        let progress = ReplayProgress {
            chunks_sent: 1,
            total_chunks: 4,
            is_processing: false,
            is_complete: false,
            error: None,
        };
        assert_eq!(progress.percent(), 25.0);

        let empty = ReplayProgress { total_chunks: 0, chunks_sent: 0, ..progress };
        assert_eq!(empty.percent(), 0.0);
    }
}
