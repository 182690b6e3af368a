use serde::Serialize;

/// An audio input device available for live capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioSource {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// Shape of the samples a live stream delivers. Fixed for the life of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Whole frames contained in `sample_count` interleaved samples.
    pub fn frames(&self, sample_count: usize) -> usize {
        if self.channels == 0 {
            return 0;
        }
        sample_count / self.channels as usize
    }
}

/// Fully decoded, de-interleaved audio at its native sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// One sample sequence per channel, all of equal length.
    pub channel_data: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(channel_data: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            channel_data,
            sample_rate,
        }
    }

    pub fn channels(&self) -> usize {
        self.channel_data.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channel_data.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }
}
