//! Whole-file audio decoding for replay capture via Symphonia.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::models::audio_models::DecodedAudio;
use crate::models::config::SourceFormat;
use crate::models::error::CaptureError;

/// Decode a complete audio file into per-channel f32 samples at its native
/// sample rate.
///
/// `format` only steers the container probe; the bytes decide. Fails with
/// `DecodeError` on malformed or unsupported input and on files that decode
/// to zero frames.
pub fn decode_audio(bytes: &[u8], format: SourceFormat) -> Result<DecodedAudio, CaptureError> {
    if bytes.is_empty() {
        return Err(CaptureError::DecodeError("empty source".into()));
    }

    // MediaSourceStream needs an owned ('static) source.
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = format.extension() {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| CaptureError::DecodeError(format!("unrecognized container ({:?}): {}", format, e)))?;

    let mut reader = probed.format;
    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| CaptureError::DecodeError("no audio track".into()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| CaptureError::DecodeError(format!("unsupported codec: {}", e)))?;

    let mut channel_data: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(CaptureError::DecodeError(format!("read failed: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(CaptureError::DecodeError(format!("decode failed: {}", e))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            continue;
        }
        if channel_data.is_empty() {
            channel_data = vec![Vec::new(); channels];
        } else if channel_data.len() != channels {
            return Err(CaptureError::DecodeError(format!(
                "channel count changed mid-stream ({} -> {})",
                channel_data.len(),
                channels
            )));
        }
        sample_rate = spec.rate;

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_planar_ref(decoded);
        let samples = buf.samples();
        let frames = samples.len() / channels;
        for (ch, out) in channel_data.iter_mut().enumerate() {
            out.extend_from_slice(&samples[ch * frames..(ch + 1) * frames]);
        }
    }

    let audio = DecodedAudio::new(channel_data, sample_rate);
    if audio.frame_count() == 0 {
        return Err(CaptureError::DecodeError("source contains no audio frames".into()));
    }
    if audio.sample_rate == 0 {
        return Err(CaptureError::DecodeError("source has no sample rate".into()));
    }

    log::debug!(
        "Decoded {:.2}s of audio ({} ch @ {} Hz)",
        audio.duration_secs(),
        audio.channels(),
        audio.sample_rate
    );
    Ok(audio)
}
