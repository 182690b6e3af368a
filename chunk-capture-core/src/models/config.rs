use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Chunk length used by the meeting client when none is configured.
pub const DEFAULT_CHUNK_DURATION_SECS: f64 = 120.0;

/// Segmentation settings shared by live and replay capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Nominal length of every chunk in seconds (the last one may be shorter).
    pub chunk_duration_secs: f64,
}

impl ChunkingConfig {
    pub fn with_chunk_duration(chunk_duration_secs: f64) -> Self {
        Self { chunk_duration_secs }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.chunk_duration_secs.is_finite() {
            return Err("chunk duration must be a finite number of seconds".into());
        }
        if self.chunk_duration_secs <= 0.0 {
            return Err(format!(
                "chunk duration must be positive, got {}",
                self.chunk_duration_secs
            ));
        }
        self.chunk_period().map(|_| ())
    }

    /// Chunk period as a `Duration`. Fails when the value does not fit one.
    pub fn chunk_period(&self) -> Result<Duration, String> {
        Duration::try_from_secs_f64(self.chunk_duration_secs)
            .map_err(|e| format!("chunk duration {}s is out of range: {}", self.chunk_duration_secs, e))
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_duration_secs: DEFAULT_CHUNK_DURATION_SECS,
        }
    }
}

/// Declared container of a replay source. Only used as a decoder hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Wav,
    Mp3,
    Ogg,
    Webm,
    M4a,
    Flac,
    Unknown,
}

impl SourceFormat {
    pub fn from_mime_type(mime: &str) -> Self {
        // Drop parameters such as "audio/webm;codecs=opus".
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => Self::Wav,
            "audio/mpeg" | "audio/mp3" => Self::Mp3,
            "audio/ogg" | "application/ogg" => Self::Ogg,
            "audio/webm" => Self::Webm,
            "audio/m4a" | "audio/mp4" | "audio/x-m4a" | "audio/aac" => Self::M4a,
            "audio/flac" | "audio/x-flac" => Self::Flac,
            _ => Self::Unknown,
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Self::Wav,
            "mp3" => Self::Mp3,
            "ogg" | "oga" => Self::Ogg,
            "webm" => Self::Webm,
            "m4a" | "mp4" | "aac" => Self::M4a,
            "flac" => Self::Flac,
            _ => Self::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// File extension handed to the decoder probe, if any.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Wav => Some("wav"),
            Self::Mp3 => Some("mp3"),
            Self::Ogg => Some("ogg"),
            Self::Webm => Some("webm"),
            Self::M4a => Some("m4a"),
            Self::Flac => Some("flac"),
            Self::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_two_minutes() {
        let config = ChunkingConfig::default();
        assert_eq!(config.chunk_duration_secs, 120.0);
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_period(), Ok(Duration::from_secs(120)));
    }

    #[test]
    fn rejects_non_positive_and_non_finite() {
        assert!(ChunkingConfig::with_chunk_duration(0.0).validate().is_err());
        assert!(ChunkingConfig::with_chunk_duration(-2.0).validate().is_err());
        assert!(ChunkingConfig::with_chunk_duration(f64::NAN).validate().is_err());
        assert!(ChunkingConfig::with_chunk_duration(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn rejects_duration_too_large_for_a_period() {
        let config = ChunkingConfig::with_chunk_duration(1e20);
        assert!(config.chunk_period().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ChunkingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ChunkingConfig::default());

        let config: ChunkingConfig = serde_json::from_str(r#"{"chunk_duration_secs": 30.0}"#).unwrap();
        assert_eq!(config.chunk_duration_secs, 30.0);
    }

    #[test]
    fn source_format_from_mime() {
        assert_eq!(SourceFormat::from_mime_type("audio/webm;codecs=opus"), SourceFormat::Webm);
        assert_eq!(SourceFormat::from_mime_type("audio/mpeg"), SourceFormat::Mp3);
        assert_eq!(SourceFormat::from_mime_type("AUDIO/WAV"), SourceFormat::Wav);
        assert_eq!(SourceFormat::from_mime_type("video/quicktime"), SourceFormat::Unknown);
    }

    #[test]
    fn source_format_from_path() {
        assert_eq!(SourceFormat::from_path(Path::new("meeting.M4A")), SourceFormat::M4a);
        assert_eq!(SourceFormat::from_path(Path::new("notes")), SourceFormat::Unknown);
        assert_eq!(SourceFormat::Unknown.extension(), None);
    }
}
