//! Canonical 16-bit PCM WAV encoding.
//!
//! Every chunk leaves the crate as a single contiguous buffer: the standard
//! 44-byte RIFF header followed by little-endian signed 16-bit samples,
//! frame-major and channel-minor. No extra chunks, no padding.

use crate::models::error::CaptureError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Output bit depth. Fixed.
pub const BIT_DEPTH: u16 = 16;

/// PCM format code in the `fmt ` chunk.
pub const PCM_FORMAT: u16 = 1;

const BYTES_PER_SAMPLE: usize = (BIT_DEPTH / 8) as usize;

// Keeps `channels * bit_depth` inside the u16 header fields.
const MAX_CHANNELS: usize = (u16::MAX / BIT_DEPTH) as usize;

/// Generate a 44-byte WAV RIFF header.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(sample_rate: u32, bit_depth: u16, channels: u16, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let byte_rate = sample_rate * channels as u32 * bit_depth as u32 / 8;
    let block_align = channels * bit_depth / 8;
    let chunk_size = 36 + data_size;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Fields of a canonical 44-byte header, read back from encoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub format_code: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bit_depth: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Parse the canonical layout produced by [`generate_wav_header`].
    ///
    /// Files with extra chunks before `data` are rejected.
    pub fn parse(bytes: &[u8]) -> Result<Self, CaptureError> {
        if bytes.len() < WAV_HEADER_SIZE {
            return Err(CaptureError::DecodeError(format!(
                "WAV header needs {} bytes, got {}",
                WAV_HEADER_SIZE,
                bytes.len()
            )));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(CaptureError::DecodeError("missing RIFF/WAVE magic".into()));
        }
        if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
            return Err(CaptureError::DecodeError("not a canonical 44-byte header".into()));
        }

        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        Ok(Self {
            riff_size: u32_at(4),
            format_code: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bit_depth: u16_at(34),
            data_size: u32_at(40),
        })
    }

    pub fn frame_count(&self) -> usize {
        if self.block_align == 0 {
            return 0;
        }
        self.data_size as usize / self.block_align as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// Quantize one float sample to signed 16-bit.
///
/// Clamps to `[-1.0, 1.0]`, scales negatives by 32768 and non-negatives by
/// 32767, then truncates toward zero (0.5 → 16383).
pub fn quantize_sample(sample: f32) -> i16 {
    let clamped = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Encode de-interleaved channel data as a canonical 16-bit PCM WAV buffer.
///
/// Fails with `InvalidAudioData` for zero channels, zero frames, or
/// channels of unequal length.
pub fn encode_wav<C: AsRef<[f32]>>(channel_data: &[C], sample_rate: u32) -> Result<Vec<u8>, CaptureError> {
    let channels = channel_data.len();
    if channels == 0 {
        return Err(CaptureError::InvalidAudioData("no channels".into()));
    }
    if channels > MAX_CHANNELS {
        return Err(CaptureError::InvalidAudioData(format!("too many channels: {}", channels)));
    }
    if sample_rate == 0 {
        return Err(CaptureError::InvalidAudioData("sample rate must be positive".into()));
    }
    if sample_rate as u64 * (channels * BYTES_PER_SAMPLE) as u64 > u32::MAX as u64 {
        return Err(CaptureError::InvalidAudioData(format!(
            "byte rate overflows the header at {} Hz x {} channels",
            sample_rate, channels
        )));
    }

    let frame_count = channel_data[0].as_ref().len();
    if frame_count == 0 {
        return Err(CaptureError::InvalidAudioData("no frames".into()));
    }
    if let Some((index, channel)) = channel_data
        .iter()
        .enumerate()
        .find(|(_, c)| c.as_ref().len() != frame_count)
    {
        return Err(CaptureError::InvalidAudioData(format!(
            "channel {} has {} frames, channel 0 has {}",
            index,
            channel.as_ref().len(),
            frame_count
        )));
    }

    let data_len = frame_count * channels * BYTES_PER_SAMPLE;
    let data_size = u32::try_from(data_len)
        .ok()
        .filter(|size| size.checked_add(36).is_some())
        .ok_or_else(|| CaptureError::InvalidAudioData(format!("{} data bytes exceed the WAV size limit", data_len)))?;

    let mut wav = Vec::with_capacity(WAV_HEADER_SIZE + data_len);
    wav.extend_from_slice(&generate_wav_header(sample_rate, BIT_DEPTH, channels as u16, data_size));

    for frame in 0..frame_count {
        for channel in channel_data {
            wav.extend_from_slice(&quantize_sample(channel.as_ref()[frame]).to_le_bytes());
        }
    }

    Ok(wav)
}

/// Split interleaved samples into one sequence per channel.
///
/// A trailing partial frame is dropped.
pub fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    if channels == 0 {
        return Vec::new();
    }
    let frame_count = samples.len() / channels;
    let mut out = vec![Vec::with_capacity(frame_count); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            out[ch].push(sample);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_samples(wav: &[u8]) -> Vec<i16> {
        wav[WAV_HEADER_SIZE..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn header_riff_magic() {
        let header = generate_wav_header(48000, 16, 2, 0);
        assert_eq!(header.len(), 44);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn header_48khz_stereo_16bit() {
        let header = WavHeader::parse(&generate_wav_header(48000, 16, 2, 9600)).unwrap();

        assert_eq!(header.format_code, 1);
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 48000);
        assert_eq!(header.byte_rate, 192000); // 48000 * 2 * 16/8
        assert_eq!(header.block_align, 4); // 2 * 16/8
        assert_eq!(header.bit_depth, 16);
        assert_eq!(header.data_size, 9600);
        assert_eq!(header.riff_size, 36 + 9600);
        assert_eq!(header.frame_count(), 2400);
    }

    #[test]
    fn encode_known_mono_sequence() {
        let wav = encode_wav(&[vec![0.0f32, 0.5, -1.0, 1.0]], 8000).unwrap();
        assert_eq!(wav.len(), 44 + 8);

        let header = WavHeader::parse(&wav).unwrap();
        assert_eq!(header.sample_rate, 8000);
        assert_eq!(header.channels, 1);
        assert_eq!(header.bit_depth, 16);
        assert_eq!(header.data_size, 8);
        assert_eq!(header.riff_size, 44);

        // 0.5 * 32767 = 16383.5, truncated toward zero
        assert_eq!(pcm_samples(&wav), vec![0, 16383, -32768, 32767]);
    }

    #[test]
    fn quantize_clamps_and_truncates() {
        assert_eq!(quantize_sample(2.0), 32767);
        assert_eq!(quantize_sample(-3.5), -32768);
        assert_eq!(quantize_sample(-0.5), -16384);
        assert_eq!(quantize_sample(-0.00001), 0);
        assert_eq!(quantize_sample(f32::NAN), 0);
    }

    #[test]
    fn interleaves_frame_major() {
        let left = [0.0f32, 1.0, -1.0];
        let right = [1.0f32, 0.0, 1.0];
        let wav = encode_wav(&[&left[..], &right[..]], 16000).unwrap();

        let header = WavHeader::parse(&wav).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.block_align, 4);
        assert_eq!(header.data_size, 12);
        assert_eq!(pcm_samples(&wav), vec![0, 32767, 32767, 0, -32768, 32767]);
    }

    #[test]
    fn rejects_contract_violations() {
        let none: [Vec<f32>; 0] = [];
        assert!(matches!(encode_wav(&none, 8000), Err(CaptureError::InvalidAudioData(_))));
        assert!(matches!(
            encode_wav(&[Vec::<f32>::new()], 8000),
            Err(CaptureError::InvalidAudioData(_))
        ));
        assert!(matches!(
            encode_wav(&[vec![0.0f32; 3], vec![0.0f32; 2]], 8000),
            Err(CaptureError::InvalidAudioData(_))
        ));
        assert!(matches!(encode_wav(&[vec![0.0f32]], 0), Err(CaptureError::InvalidAudioData(_))));
    }

    #[test]
    fn parse_rejects_short_or_foreign_input() {
        assert!(WavHeader::parse(&[0u8; 10]).is_err());
        let mut header = generate_wav_header(8000, 16, 1, 0);
        header[0..4].copy_from_slice(b"RIFX");
        assert!(WavHeader::parse(&header).is_err());
    }

    #[test]
    fn deinterleave_stereo() {
        let split = deinterleave(&[0.1, 0.2, 0.3, 0.4, 0.5], 2);
        assert_eq!(split, vec![vec![0.1, 0.3], vec![0.2, 0.4]]);
        assert!(deinterleave(&[0.1], 0).is_empty());
    }
}
